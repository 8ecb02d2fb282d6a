//! x86-64 backend. Instruction selection produces pseudo operands,
//! stack allocation gives each of them a frame slot and the fixup pass
//! rewrites whatever the hardware can't encode. The result renders as FASM.
pub mod assembly;
pub mod fixup;
mod output;
pub mod select;
pub mod stack;

use crate::ir;
use assembly::Instruction;
use std::fmt;

pub use output::AssemblyOutput;

#[derive(Debug, Clone)]
pub struct Program {
    pub functions: Vec<Function>,
    pub main_function: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub has_return_value: bool,
    pub instructions: AssemblyOutput,
    /// Most negative rbp offset in use, 0 when the function has no slots
    pub stack_size: i64,
}

impl Program {
    pub fn main(&self) -> Option<&Function> {
        self.main_function.map(|index| &self.functions[index])
    }
}

impl Function {
    /// Bytes reserved below rbp, keeping rsp 16-byte aligned
    pub fn frame_size(&self) -> i64 {
        let size = -self.stack_size;
        (size + 15) / 16 * 16
    }
}

/// Runs every x86-64 pass over the IR
pub fn generate(program: &ir::Program) -> Program {
    let mut program = select::select(program);
    for function in &mut program.functions {
        stack::allocate(function);
        fixup::legalize(function);
    }
    program
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        writeln!(f, "  push rbp")?;
        writeln!(f, "  mov rbp, rsp")?;
        let frame = self.frame_size();
        if frame != 0 {
            writeln!(f, "  sub rsp, {}", frame)?;
        }
        for instruction in self.instructions.iter() {
            match instruction {
                Instruction::Label(_) => writeln!(f, "{}", instruction)?,
                Instruction::Ret => {
                    writeln!(f, "  mov rsp, rbp")?;
                    writeln!(f, "  pop rbp")?;
                    writeln!(f, "  ret")?;
                }
                _ => writeln!(f, "  {}", instruction)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let main = self
            .main()
            .unwrap_or_else(|| crate::ice!("program has no main function"));
        writeln!(f, "format ELF64 executable")?;
        writeln!(f, "segment readable executable")?;
        writeln!(f, "entry _start")?;
        writeln!(f, "_start:")?;
        writeln!(f, "  call {}", main.name)?;
        if main.has_return_value {
            writeln!(f, "  mov rdi, rax")?;
        } else {
            writeln!(f, "  mov rdi, 0")?;
        }
        writeln!(f, "  mov rax, 60")?;
        writeln!(f, "  syscall")?;
        for function in &self.functions {
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::assembly::{Operand, Register};
    use super::*;
    use crate::error::{Reporter, SourceMetadata};

    pub(crate) fn lower(source: &str) -> ir::Program {
        let meta = SourceMetadata::new(source);
        let mut reporter = Reporter::new();
        let mut program = crate::grammar::parse_program(&meta, &mut reporter);
        assert_eq!(reporter.error_count(), 0);
        crate::resolve::resolve(&mut program, &meta).expect("resolution failed");
        let program = crate::typechecker::check_program(&program, &meta).expect("type errors");
        ir::emit(&program)
    }

    fn code(function: &Function) -> Vec<Instruction> {
        function
            .instructions
            .iter()
            .filter(|instruction| !matches!(instruction, Instruction::Comment(_)))
            .cloned()
            .collect()
    }

    #[test]
    fn literal_return() {
        let program = generate(&lower("fn main(): i64 = 42;"));
        let main = program.main().unwrap();
        assert_eq!(main.stack_size, 0);
        assert_eq!(
            code(main),
            vec![
                Instruction::Mov {
                    dst: Register::Ax.into(),
                    src: Operand::Immediate(42)
                },
                Instruction::Ret,
            ]
        );
        let text = program.to_string();
        assert!(text.starts_with("format ELF64 executable\nsegment readable executable\nentry _start\n_start:\n  call main\n  mov rdi, rax\n  mov rax, 60\n  syscall\n"));
        assert!(text.contains("main:\n  push rbp\n  mov rbp, rsp\n"));
        assert!(!text.contains("sub rsp"));
        assert!(text.ends_with("  mov rax, 42\n  mov rsp, rbp\n  pop rbp\n  ret\n"));
    }

    #[test]
    fn unit_main_exits_with_zero() {
        let text = generate(&lower("fn main() = {};")).to_string();
        assert!(text.contains("  call main\n  mov rdi, 0\n"));
    }

    #[test]
    fn ir_text_is_kept_as_comments() {
        let program = generate(&lower("fn main(): i64 = 3 + 3 + 3;"));
        let main = program.main().unwrap();
        let comments: Vec<_> = main
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Comment(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            comments,
            vec![
                "temp.1 = add 3, 3",
                "temp.2 = add temp.1, 3",
                "FIXUP: memory to memory mov",
                "mov qword [rbp - 16], qword [rbp - 8]",
                "ret temp.2"
            ]
        );
        // fixup notes come in pairs, the rest is one comment per IR instruction
        let ir_lines: Vec<_> = comments
            .iter()
            .enumerate()
            .filter(|(index, text)| {
                !text.starts_with("FIXUP:")
                    && (*index == 0 || !comments[index - 1].starts_with("FIXUP:"))
            })
            .map(|(_, text)| *text)
            .collect();
        assert_eq!(
            ir_lines,
            vec!["temp.1 = add 3, 3", "temp.2 = add temp.1, 3", "ret temp.2"]
        );
    }

    #[test]
    fn frame_is_rounded_to_sixteen() {
        let program = generate(&lower("fn main(): i64 = { x := 1; y := 2; z := 3; x + y + z };"));
        let main = program.main().unwrap();
        assert_eq!(main.stack_size, -40);
        assert_eq!(main.frame_size(), 48);
        assert!(program.to_string().contains("  sub rsp, 48\n"));
    }

    #[test]
    fn no_pseudo_survives() {
        let program = generate(&lower(
            "fn f(a: i64, b: bool): i64 = if b a * 2 else a / 3;\nfn main(): i64 = f(7, 1 < 2);",
        ));
        for function in &program.functions {
            for instruction in function.instructions.iter() {
                let mut instruction = instruction.clone();
                instruction.map_operands(|operand| {
                    assert!(!matches!(operand, Operand::Pseudo(_)), "{:?}", operand)
                });
            }
        }
        // renders without hitting an ICE
        let _ = program.to_string();
    }
}
