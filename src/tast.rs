//! Typed tree: the syntax tree after inference, every node carries its type.
use crate::ast::BinaryOperator;
use crate::error::Span;
use crate::types::Type;

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
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
    pub body: Expr,
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug)]
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
    /// The expression itself is unit, `declared` is the variable's type
    VariableDeclaration {
        name: String,
        declared: Type,
        /// whether `declared` came from an annotation
        annotated: bool,
        initializer: Box<Expr>,
    },
    VariableReference(String),
    Assignment {
        /// resolved name of the assigned variable
        target: String,
        target_type: Type,
        value: Box<Expr>,
    },
    FunctionCall {
        name: String,
        parameters: Vec<Type>,
        arguments: Vec<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer(value) => write!(f, "{}", value),
            ExprKind::Boolean(value) => write!(f, "{}", value),
            ExprKind::Binary { operator, lhs, rhs } => {
                write!(f, "({} {} {}): {}", lhs, operator, rhs, self.ty)
            }
            ExprKind::Block { expressions, tail } => {
                f.write_str("{")?;
                for expr in expressions {
                    write!(f, " {};", expr)?;
                }
                if let Some(tail) = tail {
                    write!(f, " {}", tail)?;
                }
                write!(f, " }}: {}", self.ty)
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => {
                write!(f, "(if {} {}", condition, then)?;
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
                write!(f, "): {}", self.ty)
            }
            ExprKind::VariableDeclaration {
                name,
                declared,
                initializer,
                ..
            } => write!(f, "{}: {} = {}", name, declared, initializer),
            ExprKind::VariableReference(name) => write!(f, "{}: {}", name, self.ty),
            ExprKind::Assignment { target, value, .. } => write!(f, "{} = {}", target, value),
            ExprKind::FunctionCall { name, arguments, .. } => {
                write!(f, "{}({}): {}", name, arguments.iter().format(", "), self.ty)
            }
        }
    }
}

impl fmt::Display for FunctionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fn {}({}): {} = {};",
            self.name,
            self.parameters
                .iter()
                .format_with(", ", |(name, ty), f| f(&format_args!("{}: {}", name, ty))),
            self.return_type,
            self.body
        )
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
