use crate::ast::BinaryOperator;
use itertools::Itertools;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Unit,
    I64,
    Bool,
    Function(FunctionType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub parameters: Vec<Type>,
    pub return_type: Box<Type>,
}

lazy_static! {
    static ref BUILTIN_TYPES: HashMap<&'static str, Type> = {
        let mut types = HashMap::new();
        types.insert("()", Type::Unit);
        types.insert("i64", Type::I64);
        types.insert("bool", Type::Bool);
        types
    };
}

impl Type {
    /// Looks a written type name up in the builtin table
    pub fn from_name(name: &str) -> Option<Type> {
        BUILTIN_TYPES.get(name).cloned()
    }

    pub fn supports_operator(&self, operator: BinaryOperator) -> bool {
        match self {
            Type::I64 => true,
            Type::Bool => operator.is_comparison(),
            Type::Unit | Type::Function(_) => false,
        }
    }

    pub const fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Unit => f.write_str("()"),
            Type::I64 => f.write_str("i64"),
            Type::Bool => f.write_str("bool"),
            Type::Function(function) => write!(f, "{}", function),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fn({}) -> {}",
            self.parameters.iter().format(", "),
            self.return_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        assert_eq!(Type::from_name("i64"), Some(Type::I64));
        assert_eq!(Type::from_name("()"), Some(Type::Unit));
        assert_eq!(Type::from_name("int"), None);
    }

    #[test]
    fn operator_support() {
        assert!(Type::Bool.supports_operator(BinaryOperator::Equal));
        assert!(!Type::Bool.supports_operator(BinaryOperator::Add));
        assert!(Type::I64.supports_operator(BinaryOperator::Divide));
        assert!(!Type::Unit.supports_operator(BinaryOperator::Equal));
    }

    #[test]
    fn function_type_display() {
        let ty = Type::Function(FunctionType {
            parameters: vec![Type::I64, Type::Bool],
            return_type: Box::new(Type::I64),
        });
        assert_eq!(ty.to_string(), "fn(i64, bool) -> i64");
    }
}
