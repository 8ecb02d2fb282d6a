//! QBE intermediate language output, written straight from the IR.
use crate::ast::BinaryOperator;
use crate::ir::{self, Instruction, NameGenerator, Operand};
use itertools::Itertools;
use std::fmt;
use std::io::{self, Write};

/// GNU as source for the `syscall1(number, argument)` helper the `_start` wrapper calls
pub const SYSCALL_STUB: &str = "\
.text
.globl syscall1
syscall1:
    movq %rdi, %rax
    movq %rsi, %rdi
    syscall
    ret
";

struct Value<'a>(&'a Operand);

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Operand::Constant(value) => write!(f, "{}", value),
            Operand::Var(name) => write!(f, "%{}", name),
        }
    }
}

const fn opcode(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Add => "add",
        BinaryOperator::Subtract => "sub",
        BinaryOperator::Multiply => "mul",
        BinaryOperator::Divide => "div",
        BinaryOperator::Equal => "ceql",
        BinaryOperator::NotEqual => "cnel",
        BinaryOperator::Greater => "csgtl",
        BinaryOperator::GreaterEqual => "csgel",
        BinaryOperator::Less => "csltl",
        BinaryOperator::LessEqual => "cslel",
    }
}

pub fn emit(output: &mut dyn Write, program: &ir::Program) -> io::Result<()> {
    let main = program
        .main()
        .unwrap_or_else(|| crate::ice!("program has no main function"));
    writeln!(output, "export function $_start() {{")?;
    writeln!(output, "@start")?;
    if main.has_return_value {
        writeln!(output, "\t%result =l call ${}()", main.name)?;
        writeln!(output, "\tcall $syscall1(l 60, l %result)")?;
    } else {
        writeln!(output, "\tcall ${}()", main.name)?;
        writeln!(output, "\tcall $syscall1(l 60, l 0)")?;
    }
    writeln!(output, "\thlt")?;
    writeln!(output, "}}")?;

    // fallthrough labels continue the program's own numbering
    let mut names = program.names.clone();
    for function in &program.functions {
        emit_function(output, function, &mut names)?;
    }
    Ok(())
}

fn emit_function(
    output: &mut dyn Write,
    function: &ir::Function,
    names: &mut NameGenerator,
) -> io::Result<()> {
    tracing::trace!(target: "qbe", "emitting {}", function.name);
    write!(output, "export function ")?;
    if function.has_return_value {
        write!(output, "l ")?;
    }
    writeln!(
        output,
        "${}({}) {{",
        function.name,
        function
            .parameters
            .iter()
            .format_with(", ", |parameter, f| f(&format_args!("l %{}", parameter)))
    )?;
    writeln!(output, "@start")?;
    for instruction in &function.instructions {
        emit_instruction(output, instruction, names)?;
    }
    writeln!(output, "}}")
}

fn emit_instruction(
    output: &mut dyn Write,
    instruction: &Instruction,
    names: &mut NameGenerator,
) -> io::Result<()> {
    match instruction {
        Instruction::Return(Some(value)) => writeln!(output, "\tret {}", Value(value)),
        Instruction::Return(None) => writeln!(output, "\tret"),
        Instruction::Binary {
            operator,
            lhs,
            rhs,
            dst,
        } => writeln!(
            output,
            "\t{} =l {} {}, {}",
            Value(dst),
            opcode(*operator),
            Value(lhs),
            Value(rhs)
        ),
        Instruction::Copy { src, dst } => {
            writeln!(output, "\t{} =l copy {}", Value(dst), Value(src))
        }
        Instruction::Label(label) => writeln!(output, "@{}", label),
        Instruction::Jump(label) => writeln!(output, "\tjmp @{}", label),
        Instruction::JumpIfNotZero { value, label } => {
            let after = names.next_label("qbe.extra");
            writeln!(output, "\tjnz {}, @{}, @{}", Value(value), label, after)?;
            writeln!(output, "@{}", after)
        }
        Instruction::JumpIfZero { value, label } => {
            let after = names.next_label("qbe.extra");
            writeln!(output, "\tjnz {}, @{}, @{}", Value(value), after, label)?;
            writeln!(output, "@{}", after)
        }
        Instruction::Call {
            function,
            arguments,
            result,
        } => {
            write!(output, "\t")?;
            if let Some(result) = result {
                write!(output, "{} =l ", Value(result))?;
            }
            writeln!(
                output,
                "call ${}({})",
                function,
                arguments
                    .iter()
                    .format_with(", ", |argument, f| f(&format_args!("l {}", Value(argument))))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Reporter, SourceMetadata};

    fn render(source: &str) -> String {
        let meta = SourceMetadata::new(source);
        let mut reporter = Reporter::new();
        let mut program = crate::grammar::parse_program(&meta, &mut reporter);
        assert_eq!(reporter.error_count(), 0);
        crate::resolve::resolve(&mut program, &meta).expect("resolution failed");
        let program = crate::typechecker::check_program(&program, &meta).expect("type errors");
        let mut output = Vec::new();
        emit(&mut output, &ir::emit(&program)).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn start_wrapper_returns_main_result() {
        let text = render("fn main(): i64 = 3 + 3;");
        assert_eq!(
            text,
            "export function $_start() {\n@start\n\t%result =l call $main()\n\tcall $syscall1(l 60, l %result)\n\thlt\n}\n\
             export function l $main() {\n@start\n\t%temp.1 =l add 3, 3\n\tret %temp.1\n}\n"
        );
    }

    #[test]
    fn unit_main_exits_with_zero() {
        let text = render("fn main() = {};");
        assert!(text.contains("\tcall $main()\n\tcall $syscall1(l 60, l 0)\n"));
        assert!(text.contains("export function $main() {\n@start\n\tret\n}\n"));
    }

    #[test]
    fn parameters_calls_and_comparisons() {
        let text = render(
            "fn less(a: i64, b: i64): bool = a < b;\nfn main(): i64 = if less(1, 2) 1 else 0;",
        );
        assert!(text.contains("export function l $less(l %a.0, l %b.1) {\n"));
        assert!(text.contains("\t%temp.1 =l csltl %a.0, %b.1\n"));
        assert!(text.contains("\t%temp.3 =l call $less(l 1, l 2)\n"));
    }

    #[test]
    fn conditional_jumps_get_fallthrough_labels() {
        let text = render("fn main(): i64 = if true 1 else 2;");
        // the if used label id 1, so the extra label continues from there
        assert!(text.contains("\tjnz 1, @qbe.extra.2, @if_else.1\n@qbe.extra.2\n"));
        assert!(text.contains("\tjmp @if_end.1\n@if_else.1\n"));
        assert!(text.contains("\t%temp.1 =l copy 2\n"));
    }
}
