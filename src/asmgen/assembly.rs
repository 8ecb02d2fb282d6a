use crate::write_instruction;
use std::fmt;

/// Machine instruction, operands in destination, source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Move data into `dst`
    Mov { dst: Operand, src: Operand },
    /// In-place arithmetic: `dst = dst <op> src`
    Binary {
        opcode: BinaryOpcode,
        dst: Operand,
        src: Operand,
    },
    /// Signed divide of rdx:rax, quotient to rax
    Idiv(Operand),
    /// Sign extend rax into rdx
    Cqo,
    /// Compare two operands, setting the flags
    Cmp { lhs: Operand, rhs: Operand },
    /// Sets the low byte of `dst` to 1 or 0 depending on the flags
    SetCC { condition: Condition, dst: Operand },
    Push(Operand),
    Label(String),
    Jmp(String),
    JmpCC { condition: Condition, label: String },
    Call(String),
    AllocateStack(i64),
    DeallocateStack(i64),
    /// Expanded to the whole epilogue when rendered
    Ret,
    Comment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Imul,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
    /// Offset from rbp
    Stack(i64),
    /// Named placeholder, only valid until stack allocation
    Pseudo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Ax,
    Cx,
    Dx,
    Di,
    Si,
    R8,
    R9,
    R10,
    R11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    One,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals,
    NotEquals,
    Greater,
    GreaterEquals,
    Less,
    LessEquals,
}

impl Operand {
    pub const fn is_memory(&self) -> bool {
        matches!(self, Operand::Stack(_))
    }

    /// Immediates that can't be encoded as a sign extended 32-bit value
    pub fn is_wide_immediate(&self) -> bool {
        match self {
            Operand::Immediate(value) => i32::try_from(*value).is_err(),
            _ => false,
        }
    }

    pub const fn sized(&self, size: OperandSize) -> SizedOperand {
        SizedOperand {
            operand: self,
            size,
        }
    }
}

impl Instruction {
    /// Visits every operand, in textual order
    pub fn map_operands<F>(&mut self, mut mapper: F)
    where
        F: FnMut(&mut Operand),
    {
        match self {
            Instruction::Mov { dst, src } | Instruction::Binary { dst, src, .. } => {
                mapper(dst);
                mapper(src);
            }
            Instruction::Cmp { lhs, rhs } => {
                mapper(lhs);
                mapper(rhs);
            }
            Instruction::Idiv(operand)
            | Instruction::Push(operand)
            | Instruction::SetCC { dst: operand, .. } => mapper(operand),
            Instruction::Cqo
            | Instruction::Label(_)
            | Instruction::Jmp(_)
            | Instruction::JmpCC { .. }
            | Instruction::Call(_)
            | Instruction::AllocateStack(_)
            | Instruction::DeallocateStack(_)
            | Instruction::Ret
            | Instruction::Comment(_) => (),
        }
    }
}

impl From<Register> for Operand {
    fn from(register: Register) -> Self {
        Operand::Register(register)
    }
}

impl Register {
    pub const fn name(self, size: OperandSize) -> &'static str {
        use OperandSize::*;
        match (self, size) {
            (Register::Ax, One) => "al",
            (Register::Ax, Eight) => "rax",
            (Register::Cx, One) => "cl",
            (Register::Cx, Eight) => "rcx",
            (Register::Dx, One) => "dl",
            (Register::Dx, Eight) => "rdx",
            (Register::Di, One) => "dil",
            (Register::Di, Eight) => "rdi",
            (Register::Si, One) => "sil",
            (Register::Si, Eight) => "rsi",
            (Register::R8, One) => "r8b",
            (Register::R8, Eight) => "r8",
            (Register::R9, One) => "r9b",
            (Register::R9, Eight) => "r9",
            (Register::R10, One) => "r10b",
            (Register::R10, Eight) => "r10",
            (Register::R11, One) => "r11b",
            (Register::R11, Eight) => "r11",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name(OperandSize::Eight))
    }
}

pub struct SizedOperand<'a> {
    operand: &'a Operand,
    size: OperandSize,
}

impl fmt::Display for SizedOperand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.operand {
            Operand::Register(register) => f.write_str(register.name(self.size)),
            Operand::Immediate(value) => write!(f, "{}", value),
            Operand::Stack(offset) => {
                let size = match self.size {
                    OperandSize::One => "byte",
                    OperandSize::Eight => "qword",
                };
                if *offset < 0 {
                    write!(f, "{} [rbp - {}]", size, -offset)
                } else {
                    write!(f, "{} [rbp + {}]", size, offset)
                }
            }
            Operand::Pseudo(name) => crate::ice!("pseudo operand {:?} reached emission", name),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            // pseudos only show up in debug output
            Operand::Pseudo(name) => write!(f, "%{}", name),
            operand => operand.sized(OperandSize::Eight).fmt(f),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Condition::Equals => "e",
            Condition::NotEquals => "ne",
            Condition::Greater => "g",
            Condition::GreaterEquals => "ge",
            Condition::Less => "l",
            Condition::LessEquals => "le",
        })
    }
}

impl fmt::Display for BinaryOpcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BinaryOpcode::Add => "add",
            BinaryOpcode::Sub => "sub",
            BinaryOpcode::Imul => "imul",
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Mov { dst, src } => write_instruction!(f, "mov", dst, src),
            Self::Binary { opcode, dst, src } => write_instruction!(f, opcode, dst, src),
            Self::Idiv(operand) => write_instruction!(f, "idiv", operand),
            Self::Cqo => write_instruction!(f, "cqo"),
            Self::Cmp { lhs, rhs } => write_instruction!(f, "cmp", lhs, rhs),
            Self::SetCC { condition, dst } => write_instruction!(
                f,
                format!("set{}", condition),
                dst.sized(OperandSize::One)
            ),
            Self::Push(operand) => write_instruction!(f, "push", operand),
            Self::Label(label) => write!(f, "{}:", label),
            Self::Jmp(label) => write_instruction!(f, "jmp", label),
            Self::JmpCC { condition, label } => {
                write_instruction!(f, format!("j{}", condition), label)
            }
            Self::Call(function) => write_instruction!(f, "call", function),
            Self::AllocateStack(bytes) => write_instruction!(f, "sub", "rsp", bytes),
            Self::DeallocateStack(bytes) => write_instruction!(f, "add", "rsp", bytes),
            Self::Ret => write_instruction!(f, "ret"),
            Self::Comment(comment) => write!(f, "; {}", comment),
        }
    }
}

#[macro_export]
macro_rules! format_instr_args {
    () => { "" };
    ($arg:expr) => { "{}" };
    ($first:expr, $($rest:expr),+) => {
        concat!("{}, ", $crate::format_instr_args!($($rest),+))
    }
}

#[macro_export]
macro_rules! format_instr {
    ($name:expr) => { format_args!("{}", $name) };
    ($name:expr, $($args:expr),+) => {
        format_args!(concat!("{:3} ", $crate::format_instr_args!($($args),+)), $name, $($args),+)
    };
}

#[macro_export]
macro_rules! write_instruction {
    ($formatter:expr, $name:expr) => {
        $formatter.write_fmt($crate::format_instr!($name))
    };
    ($formatter:expr, $name:expr, $($args:expr),+) => { $formatter.write_fmt($crate::format_instr!($name, $($args),+)) }
}
