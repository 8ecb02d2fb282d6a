//! Untyped syntax tree, as produced by the parser.
//! Names are owned so the resolver can rewrite them in place.
use crate::error::Span;
use crate::grammar::lexer::Operator;

use itertools::Itertools;
use std::fmt;

#[derive(Debug, Default)]
pub struct Program {
    pub functions: Vec<FunctionDeclaration>,
}

#[derive(Debug)]
pub struct FunctionDeclaration {
    pub name: String,
    pub span: Span,
    pub parameters: Vec<Parameter>,
    /// `None` means the function returns unit
    pub return_type: Option<TypeName>,
    pub body: Expr,
}

#[derive(Debug)]
pub struct Parameter {
    pub name: String,
    pub type_name: TypeName,
    pub span: Span,
}

/// A type as written in the source, looked up later against the builtin table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
    pub const fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExprKind {
    Integer(i64),
    Boolean(bool),
    Binary {
        operator: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Block {
        expressions: Vec<Expr>,
        tail: Option<Box<Expr>>,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    VariableDeclaration {
        name: String,
        type_name: Option<TypeName>,
        initializer: Box<Expr>,
    },
    VariableReference(String),
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    FunctionCall {
        name: String,
        arguments: Vec<Expr>,
    },
    /// Left behind by the parser where it had to recover from an error
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOperator {
    pub const fn from_operator(op: Operator) -> Self {
        match op {
            Operator::Plus => Self::Add,
            Operator::Minus => Self::Subtract,
            Operator::Star => Self::Multiply,
            Operator::Slash => Self::Divide,
            Operator::DoubleEquals => Self::Equal,
            Operator::NotEquals => Self::NotEqual,
            Operator::AngleLeft => Self::Less,
            Operator::AngleLeftEquals => Self::LessEqual,
            Operator::AngleRight => Self::Greater,
            Operator::AngleRightEquals => Self::GreaterEqual,
        }
    }

    /// Higher binds tighter. Every operator is left associative.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Equal | Self::NotEqual => 1,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => 2,
            Self::Add | Self::Subtract => 3,
            Self::Multiply | Self::Divide => 4,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// binary expressions are fully parenthesized so the grouping the parser chose is visible
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer(value) => write!(f, "{}", value),
            ExprKind::Boolean(value) => write!(f, "{}", value),
            ExprKind::Binary { operator, lhs, rhs } => write!(f, "({} {} {})", lhs, operator, rhs),
            ExprKind::Block { expressions, tail } => {
                f.write_str("{")?;
                for expr in expressions {
                    write!(f, " {};", expr)?;
                }
                if let Some(tail) = tail {
                    write!(f, " {}", tail)?;
                }
                f.write_str(" }")
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => {
                write!(f, "if {} {}", condition, then)?;
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
                Ok(())
            }
            ExprKind::VariableDeclaration {
                name,
                type_name: Some(type_name),
                initializer,
            } => write!(f, "{}: {} = {}", name, type_name, initializer),
            ExprKind::VariableDeclaration {
                name,
                type_name: None,
                initializer,
            } => write!(f, "{} := {}", name, initializer),
            ExprKind::VariableReference(name) => f.write_str(name),
            ExprKind::Assignment { target, value } => write!(f, "{} = {}", target, value),
            ExprKind::FunctionCall { name, arguments } => {
                write!(f, "{}({})", name, arguments.iter().format(", "))
            }
            ExprKind::Error => f.write_str("<error>"),
        }
    }
}

impl fmt::Display for FunctionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fn {}({})",
            self.name,
            self.parameters
                .iter()
                .format_with(", ", |param, f| f(&format_args!(
                    "{}: {}",
                    param.name, param.type_name
                )))
        )?;
        if let Some(return_type) = &self.return_type {
            write!(f, ": {}", return_type)?;
        }
        write!(f, " = {};", self.body)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}", function)?;
        }
        Ok(())
    }
}
