use super::assembly::{BinaryOpcode, Condition, Instruction, Operand, Register};
use super::{AssemblyOutput, Function, Program};
use crate::ast::BinaryOperator;
use crate::ir;

/// Integer argument registers of the System V calling convention, in order
pub const ARGUMENT_REGISTERS: [Register; 6] = [
    Register::Di,
    Register::Si,
    Register::Dx,
    Register::Cx,
    Register::R8,
    Register::R9,
];

pub fn select(program: &ir::Program) -> Program {
    Program {
        functions: program.functions.iter().map(select_function).collect(),
        main_function: program.main_function,
    }
}

pub fn select_function(function: &ir::Function) -> Function {
    let mut instructions = AssemblyOutput::new();
    for (index, parameter) in function.parameters.iter().enumerate() {
        let src = match ARGUMENT_REGISTERS.get(index) {
            Some(register) => Operand::Register(*register),
            // return address and saved rbp sit between rbp and the first stack argument
            None => Operand::Stack(16 + 8 * (index - ARGUMENT_REGISTERS.len()) as i64),
        };
        instructions.push_back(Instruction::Mov {
            dst: Operand::Pseudo(parameter.clone()),
            src,
        });
    }
    for instruction in &function.instructions {
        instructions.push_back(Instruction::Comment(instruction.to_string()));
        instructions.extend(select_instruction(instruction));
    }
    tracing::trace!(target: "asmgen::select", "{}: {:?}", function.name, instructions);
    Function {
        name: function.name.clone(),
        has_return_value: function.has_return_value,
        instructions,
        stack_size: 0,
    }
}

fn operand(operand: &ir::Operand) -> Operand {
    match operand {
        ir::Operand::Constant(value) => Operand::Immediate(*value),
        ir::Operand::Var(name) => Operand::Pseudo(name.clone()),
    }
}

const fn condition(operator: BinaryOperator) -> Option<Condition> {
    match operator {
        BinaryOperator::Equal => Some(Condition::Equals),
        BinaryOperator::NotEqual => Some(Condition::NotEquals),
        BinaryOperator::Less => Some(Condition::Less),
        BinaryOperator::LessEqual => Some(Condition::LessEquals),
        BinaryOperator::Greater => Some(Condition::Greater),
        BinaryOperator::GreaterEqual => Some(Condition::GreaterEquals),
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => None,
    }
}

pub fn select_instruction(instruction: &ir::Instruction) -> AssemblyOutput {
    match instruction {
        ir::Instruction::Return(value) => {
            let output = AssemblyOutput::new();
            match value {
                Some(value) => output.chain_one(Instruction::Mov {
                    dst: Register::Ax.into(),
                    src: operand(value),
                }),
                None => output,
            }
            .chain_one(Instruction::Ret)
        }
        ir::Instruction::Binary {
            operator,
            lhs,
            rhs,
            dst,
        } => select_binary(*operator, operand(lhs), operand(rhs), operand(dst)),
        ir::Instruction::Copy { src, dst } => Instruction::Mov {
            dst: operand(dst),
            src: operand(src),
        }
        .into(),
        ir::Instruction::Label(label) => Instruction::Label(label.clone()).into(),
        ir::Instruction::Jump(label) => Instruction::Jmp(label.clone()).into(),
        ir::Instruction::JumpIfZero { value, label } => {
            select_conditional_jump(Condition::Equals, operand(value), label)
        }
        ir::Instruction::JumpIfNotZero { value, label } => {
            select_conditional_jump(Condition::NotEquals, operand(value), label)
        }
        ir::Instruction::Call {
            function,
            arguments,
            result,
        } => select_call(function, arguments, result.as_ref()),
    }
}

fn select_binary(operator: BinaryOperator, lhs: Operand, rhs: Operand, dst: Operand) -> AssemblyOutput {
    if let Some(condition) = condition(operator) {
        return AssemblyOutput::new()
            .chain_one(Instruction::Cmp { lhs, rhs })
            .chain_one(Instruction::Mov {
                dst: dst.clone(),
                src: Operand::Immediate(0),
            })
            .chain_one(Instruction::SetCC { condition, dst });
    }
    let opcode = match operator {
        BinaryOperator::Add => BinaryOpcode::Add,
        BinaryOperator::Subtract => BinaryOpcode::Sub,
        BinaryOperator::Multiply => BinaryOpcode::Imul,
        BinaryOperator::Divide => {
            return AssemblyOutput::new()
                .chain_one(Instruction::Mov {
                    dst: Register::Ax.into(),
                    src: lhs,
                })
                .chain_one(Instruction::Cqo)
                .chain_one(Instruction::Idiv(rhs))
                .chain_one(Instruction::Mov {
                    dst,
                    src: Register::Ax.into(),
                });
        }
        _ => crate::ice!("comparison {} has no arithmetic opcode", operator),
    };
    AssemblyOutput::new()
        .chain_one(Instruction::Mov {
            dst: dst.clone(),
            src: lhs,
        })
        .chain_one(Instruction::Binary {
            opcode,
            dst,
            src: rhs,
        })
}

fn select_conditional_jump(condition: Condition, value: Operand, label: &str) -> AssemblyOutput {
    AssemblyOutput::new()
        .chain_one(Instruction::Cmp {
            lhs: value,
            rhs: Operand::Immediate(0),
        })
        .chain_one(Instruction::JmpCC {
            condition,
            label: label.to_string(),
        })
}

fn select_call(function: &str, arguments: &[ir::Operand], result: Option<&ir::Operand>) -> AssemblyOutput {
    let split = arguments.len().min(ARGUMENT_REGISTERS.len());
    let (register_arguments, stack_arguments) = arguments.split_at(split);
    // keeps rsp 16-byte aligned at the call
    let padding = if stack_arguments.len() % 2 == 1 { 8 } else { 0 };

    let mut output = AssemblyOutput::new();
    if padding != 0 {
        output.push_back(Instruction::AllocateStack(padding));
    }
    for (register, argument) in ARGUMENT_REGISTERS.iter().zip(register_arguments) {
        output.push_back(Instruction::Mov {
            dst: Operand::Register(*register),
            src: operand(argument),
        });
    }
    for argument in stack_arguments.iter().rev() {
        match operand(argument) {
            argument @ (Operand::Immediate(_) | Operand::Register(_)) => {
                output.push_back(Instruction::Push(argument));
            }
            argument => {
                output.push_back(Instruction::Mov {
                    dst: Register::Ax.into(),
                    src: argument,
                });
                output.push_back(Instruction::Push(Register::Ax.into()));
            }
        }
    }
    output.push_back(Instruction::Call(function.to_string()));
    let release = 8 * stack_arguments.len() as i64 + padding;
    if release != 0 {
        output.push_back(Instruction::DeallocateStack(release));
    }
    if let Some(result) = result {
        output.push_back(Instruction::Mov {
            dst: operand(result),
            src: Register::Ax.into(),
        });
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> ir::Operand {
        ir::Operand::Var(name.to_string())
    }

    fn pseudo(name: &str) -> Operand {
        Operand::Pseudo(name.to_string())
    }

    #[test]
    fn comparison_uses_setcc() {
        let output = select_instruction(&ir::Instruction::Binary {
            operator: BinaryOperator::Less,
            lhs: var("a"),
            rhs: ir::Operand::Constant(3),
            dst: var("t"),
        });
        assert_eq!(
            output.into_iter().collect::<Vec<_>>(),
            vec![
                Instruction::Cmp {
                    lhs: pseudo("a"),
                    rhs: Operand::Immediate(3)
                },
                Instruction::Mov {
                    dst: pseudo("t"),
                    src: Operand::Immediate(0)
                },
                Instruction::SetCC {
                    condition: Condition::Less,
                    dst: pseudo("t")
                },
            ]
        );
    }

    #[test]
    fn division_goes_through_rax() {
        let output = select_instruction(&ir::Instruction::Binary {
            operator: BinaryOperator::Divide,
            lhs: ir::Operand::Constant(10),
            rhs: var("b"),
            dst: var("t"),
        });
        let text: Vec<_> = output.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["mov rax, 10", "cqo", "idiv %b", "mov %t, rax"]);
    }

    #[test]
    fn conditional_jumps() {
        let output = select_instruction(&ir::Instruction::JumpIfNotZero {
            value: var("c"),
            label: "done.1".into(),
        });
        let text: Vec<_> = output.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["cmp %c, 0", "jne done.1"]);
    }

    #[test]
    fn call_with_stack_arguments() {
        let arguments = (1..=7)
            .map(ir::Operand::Constant)
            .chain(std::iter::once(var("x")))
            .chain(std::iter::once(ir::Operand::Constant(9)))
            .collect();
        let output = select_instruction(&ir::Instruction::Call {
            function: "many".into(),
            arguments,
            result: Some(var("r")),
        });
        let text: Vec<_> = output.iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec![
                "sub rsp, 8",
                "mov rdi, 1",
                "mov rsi, 2",
                "mov rdx, 3",
                "mov rcx, 4",
                "mov r8, 5",
                "mov r9, 6",
                "push 9",
                "mov rax, %x",
                "push rax",
                "push 7",
                "call many",
                "add rsp, 32",
                "mov %r, rax",
            ]
        );
    }

    #[test]
    fn even_stack_arguments_need_no_padding() {
        let arguments = (1..=8).map(ir::Operand::Constant).collect();
        let output = select_instruction(&ir::Instruction::Call {
            function: "f".into(),
            arguments,
            result: None,
        });
        let text: Vec<_> = output.iter().map(ToString::to_string).collect();
        assert_eq!(text.first().map(String::as_str), Some("mov rdi, 1"));
        assert_eq!(text.last().map(String::as_str), Some("add rsp, 16"));
    }

    #[test]
    fn parameters_come_from_registers_then_stack() {
        let function = ir::Function {
            name: "f".into(),
            parameters: (0..8).map(|index| format!("p.{}", index)).collect(),
            has_return_value: false,
            instructions: vec![ir::Instruction::Return(None)],
        };
        let selected = select_function(&function);
        let text: Vec<_> = selected.instructions.iter().map(ToString::to_string).collect();
        assert_eq!(text[0], "mov %p.0, rdi");
        assert_eq!(text[5], "mov %p.5, r9");
        assert_eq!(text[6], "mov %p.6, qword [rbp + 16]");
        assert_eq!(text[7], "mov %p.7, qword [rbp + 24]");
        assert_eq!(text[8], "; ret");
        assert_eq!(text[9], "ret");
    }
}
