use std::fmt;

use itertools::Itertools;

use super::{Function, Instruction, Operand, Program};

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(constant) => constant.fmt(f),
            Operand::Var(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Return(Some(value)) => write!(f, "ret {}", value),
            Instruction::Return(None) => f.write_str("ret"),
            Instruction::Binary {
                operator,
                lhs,
                rhs,
                dst,
            } => write!(f, "{} = {} {}, {}", dst, operator.ir_name(), lhs, rhs),
            Instruction::Copy { src, dst } => write!(f, "{} = copy {}", dst, src),
            Instruction::Label(label) => write!(f, "{}:", label),
            Instruction::Jump(label) => write!(f, "jmp {}", label),
            Instruction::JumpIfZero { value, label } => write!(f, "jz {}, {}", value, label),
            Instruction::JumpIfNotZero { value, label } => write!(f, "jnz {}, {}", value, label),
            Instruction::Call {
                function,
                arguments,
                result,
            } => {
                if let Some(result) = result {
                    write!(f, "{} = ", result)?;
                }
                write!(f, "call {}", function)?;
                if !arguments.is_empty() {
                    write!(f, " {}", arguments.iter().format(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}", self.name)?;
        for parameter in &self.parameters {
            write!(f, " {}", parameter)?;
        }
        for instruction in &self.instructions {
            match instruction {
                Instruction::Label(_) => write!(f, "\n{}", instruction)?,
                _ => write!(f, "\n  {}", instruction)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}\n", function)?;
        }
        Ok(())
    }
}
