//! Linear three-address IR: one flat instruction list per function,
//! variables and temporaries are plain names.
use crate::ast::BinaryOperator;

mod format;
pub mod generate;

pub use generate::emit;

#[derive(Debug, Clone)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Index of the function called `main`
    pub main_function: Option<usize>,
    /// Counters that produced this program, later passes keep allocating from here
    pub names: NameGenerator,
}

impl Program {
    pub fn main(&self) -> Option<&Function> {
        self.main_function.map(|index| &self.functions[index])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<String>,
    pub has_return_value: bool,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Constant(i64),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Return(Option<Operand>),
    Binary {
        operator: BinaryOperator,
        lhs: Operand,
        rhs: Operand,
        dst: Operand,
    },
    Copy {
        src: Operand,
        dst: Operand,
    },
    Label(String),
    Jump(String),
    JumpIfZero {
        value: Operand,
        label: String,
    },
    JumpIfNotZero {
        value: Operand,
        label: String,
    },
    Call {
        function: String,
        arguments: Vec<Operand>,
        result: Option<Operand>,
    },
}

/// Hands out program-wide unique temporaries and labels. Both counters start at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameGenerator {
    temps: usize,
    labels: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_temp(&mut self) -> String {
        self.temps += 1;
        format!("temp.{}", self.temps)
    }

    /// Id shared by a group of labels that belong together, like both labels of an `if`
    pub fn next_label_id(&mut self) -> usize {
        self.labels += 1;
        self.labels
    }

    pub fn next_label(&mut self, kind: &str) -> String {
        let id = self.next_label_id();
        format!("{}.{}", kind, id)
    }
}

impl BinaryOperator {
    /// Mnemonic used in the IR text form
    pub const fn ir_name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "sub",
            BinaryOperator::Multiply => "mul",
            BinaryOperator::Divide => "div",
            BinaryOperator::Equal => "eq",
            BinaryOperator::NotEqual => "ne",
            BinaryOperator::Less => "lt",
            BinaryOperator::LessEqual => "le",
            BinaryOperator::Greater => "gt",
            BinaryOperator::GreaterEqual => "ge",
        }
    }
}
