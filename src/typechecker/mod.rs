//! Type inference and checking.
//!
//! Signatures are collected first so bodies can call functions declared later.
//! Each body is then inferred bottom-up into the typed tree, and the typed tree
//! is checked. Every error along the way is accumulated.
use crate::ast::{self, BinaryOperator, TypeName};
use crate::error::{self, SourceMetadata};
use crate::tast;
use crate::types::{FunctionType, Type};
use std::collections::HashMap;
use thiserror::Error;

mod check;
mod infer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown type name {0:?}")]
    UnknownType(String),
    #[error("invalid expression")]
    InvalidExpression,
    #[error("could not get type for variable {0:?}")]
    UnknownVariable(String),
    #[error("could not get type for function {0:?}")]
    UnknownFunction(String),
    #[error("tried to call non function variable {name:?} with type \"{ty}\"")]
    NotAFunction { name: String, ty: Type },
    #[error("not a valid assignment target")]
    InvalidAssignmentTarget,
    #[error("mismatched types for operator \"{operator}\": \"{lhs}\" and \"{rhs}\"")]
    OperandMismatch {
        operator: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    #[error("the operator \"{operator}\" is not supported by the type \"{ty}\"")]
    UnsupportedOperator { operator: BinaryOperator, ty: Type },
    #[error("if condition must be a boolean, found \"{0}\"")]
    NonBoolCondition(Type),
    #[error("if branches have different types: \"{then}\" and \"{otherwise}\"")]
    BranchMismatch { then: Type, otherwise: Type },
    #[error("variable {name:?} is declared as \"{declared}\" but initialized with \"{found}\"")]
    AnnotationMismatch {
        name: String,
        declared: Type,
        found: Type,
    },
    #[error("cannot assign a value of type \"{found}\" to variable {name:?} of type \"{expected}\"")]
    AssignmentMismatch {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("function {name:?} takes {expected} arguments but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("argument {index} of {name:?} should be \"{expected}\", found \"{found}\"")]
    ArgumentMismatch {
        name: String,
        index: usize,
        expected: Type,
        found: Type,
    },
    #[error("function {name:?} should return \"{expected}\", but its body has type \"{found}\"")]
    ReturnMismatch {
        name: String,
        expected: Type,
        found: Type,
    },
    #[error("no function called 'main' found")]
    MissingMain,
}

pub type TypeE = error::Error<TypeError>;

pub type Signatures = HashMap<String, FunctionType>;

/// Infers and checks the whole (resolved) program.
pub fn check_program(
    program: &ast::Program,
    source_meta: &SourceMetadata,
) -> Result<tast::Program, Vec<TypeE>> {
    let mut errors = Vec::new();
    let signatures = collect_signatures(program, source_meta, &mut errors);

    let mut functions = Vec::new();
    for function in &program.functions {
        let signature = match signatures.get(&function.name) {
            Some(signature) => signature,
            None => continue,
        };
        let inferred = infer::infer_function(function, signature, &signatures, source_meta, &mut errors);
        if let Some(function) = inferred {
            tracing::trace!(target: "typecheck", "inferred {}", function);
            check::check_function(&function, source_meta, &mut errors);
            functions.push(function);
        }
    }

    if !program.functions.iter().any(|function| function.name == "main") {
        errors.push(TypeE::new(TypeError::MissingMain));
    }

    tracing::debug!(target: "typecheck", "{} type errors", errors.len());
    if errors.is_empty() {
        Ok(tast::Program { functions })
    } else {
        Err(errors)
    }
}

fn resolve_type_name(
    type_name: &TypeName,
    source_meta: &SourceMetadata,
    errors: &mut Vec<TypeE>,
) -> Option<Type> {
    let ty = Type::from_name(&type_name.name);
    if ty.is_none() {
        errors.push(
            TypeE::new(TypeError::UnknownType(type_name.name.clone()))
                .with_source(type_name.span, source_meta),
        );
    }
    ty
}

// a function with a bad annotation is left out, callers then report it as unknown
fn collect_signatures(
    program: &ast::Program,
    source_meta: &SourceMetadata,
    errors: &mut Vec<TypeE>,
) -> Signatures {
    let mut signatures = Signatures::new();
    for function in &program.functions {
        let parameters: Vec<_> = function
            .parameters
            .iter()
            .map(|parameter| resolve_type_name(&parameter.type_name, source_meta, errors))
            .collect();
        let return_type = match &function.return_type {
            Some(type_name) => resolve_type_name(type_name, source_meta, errors),
            None => Some(Type::Unit),
        };
        let signature = parameters
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .zip(return_type)
            .map(|(parameters, return_type)| FunctionType {
                parameters,
                return_type: Box::new(return_type),
            });
        if let Some(signature) = signature {
            tracing::trace!(target: "typecheck", "{}: {}", function.name, signature);
            // a duplicate is the resolver's to report, the first one wins
            signatures.entry(function.name.clone()).or_insert(signature);
        }
    }
    signatures
}
