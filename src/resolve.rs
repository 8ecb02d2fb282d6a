//! Gives every variable a unique name (`name.N`) and rewrites references to it.
//!
//! Each function gets one frame for its parameters, then a child frame for every
//! block and every branch of an `if`. Shadowing an outer frame is fine, declaring
//! the same name twice in one frame is not.
use crate::ast::{Expr, ExprKind, FunctionDeclaration, Program};
use crate::error::{self, SourceMetadata, Span};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

lazy_static! {
    /// Function names that would clash with the runtime's symbols or that the
    /// assembler reads as something other than a label
    static ref RESERVED_SYMBOLS: HashSet<String> = {
        let mut names: HashSet<String> = ["_start", "syscall1", "format", "segment", "entry", "rip"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        for base in ["ax", "bx", "cx", "dx"] {
            let letter = &base[..1];
            names.extend([format!("r{}", base), format!("e{}", base), base.to_string()]);
            names.extend([format!("{}l", letter), format!("{}h", letter)]);
        }
        for base in ["si", "di", "sp", "bp"] {
            names.extend([format!("r{}", base), format!("e{}", base), base.to_string(), format!("{}l", base)]);
        }
        for index in 8..16 {
            names.insert(format!("r{}", index));
            names.extend(["b", "w", "d"].iter().map(|suffix| format!("r{}{}", index, suffix)));
        }
        names
    };
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("variable {0:?} redefined")]
    Redefined(String),
    #[error("variable {0:?} is not declared")]
    Undeclared(String),
    #[error("duplicate function name {0:?}")]
    DuplicateFunction(String),
    #[error("function name {0:?} is reserved")]
    ReservedFunctionName(String),
}

pub type ResolveE = error::Error<ResolveError>;

/// Resolves the whole program in place, reporting every error it finds.
pub fn resolve(program: &mut Program, source_meta: &SourceMetadata) -> Result<(), Vec<ResolveE>> {
    let mut errors = Vec::new();
    let mut function_names = HashSet::new();
    for function in &mut program.functions {
        if RESERVED_SYMBOLS.contains(&function.name) {
            errors.push(
                ResolveE::new(ResolveError::ReservedFunctionName(function.name.clone()))
                    .with_source(function.span, source_meta),
            );
        }
        if !function_names.insert(function.name.clone()) {
            errors.push(
                ResolveE::new(ResolveError::DuplicateFunction(function.name.clone()))
                    .with_source(function.span, source_meta),
            );
        }
        let mut resolver = Resolver::new(source_meta);
        resolver.resolve_function(function);
        errors.append(&mut resolver.errors);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

type Frame = HashMap<String, String>;

/// Stack of scope frames, innermost last
#[derive(Debug, Default)]
struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    fn push(&mut self) {
        self.frames.push(Frame::new());
    }
    fn pop(&mut self) {
        self.frames.pop();
    }
    fn get(&self, name: &str) -> Option<&String> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
    fn declared_here(&self, name: &str) -> bool {
        self.frames
            .last()
            .map_or(false, |frame| frame.contains_key(name))
    }
    fn bind(&mut self, name: String, unique: String) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name, unique);
            }
            None => crate::ice!("binding {:?} with no scope frame", name),
        }
    }
}

struct Resolver<'a, 'src> {
    scopes: ScopeStack,
    // per function, so parameters start at 0
    counter: usize,
    errors: Vec<ResolveE>,
    source_meta: &'a SourceMetadata<'src>,
}

impl<'a, 'src> Resolver<'a, 'src> {
    fn new(source_meta: &'a SourceMetadata<'src>) -> Self {
        Self {
            scopes: ScopeStack::default(),
            counter: 0,
            errors: Vec::new(),
            source_meta,
        }
    }

    fn error(&mut self, kind: ResolveError, span: Span) {
        tracing::debug!(target: "resolve", "{}", kind);
        self.errors
            .push(ResolveE::new(kind).with_source(span, self.source_meta));
    }

    /// Binds `name` in the innermost frame and returns its unique name,
    /// or `None` when it is already declared there.
    fn declare(&mut self, name: &str, span: Span) -> Option<String> {
        if self.scopes.declared_here(name) {
            self.error(ResolveError::Redefined(name.to_string()), span);
            return None;
        }
        let unique = format!("{}.{}", name, self.counter);
        self.counter += 1;
        tracing::trace!(target: "resolve", "{name} -> {unique}");
        self.scopes.bind(name.to_string(), unique.clone());
        Some(unique)
    }

    fn resolve_function(&mut self, function: &mut FunctionDeclaration) {
        tracing::trace!(target: "resolve", "resolving function {}", function.name);
        self.scopes.push();
        for parameter in &mut function.parameters {
            if let Some(unique) = self.declare(&parameter.name, parameter.span) {
                parameter.name = unique;
            }
        }
        self.resolve_expr(&mut function.body);
        self.scopes.pop();
    }

    // runs `f` inside a fresh child frame
    fn scoped<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.scopes.push();
        f(self);
        self.scopes.pop();
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Integer(_) | ExprKind::Boolean(_) | ExprKind::Error => (),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Block { expressions, tail } => self.scoped(|resolver| {
                for expr in expressions.iter_mut() {
                    resolver.resolve_expr(expr);
                }
                if let Some(tail) = tail {
                    resolver.resolve_expr(tail);
                }
            }),
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.resolve_expr(condition);
                self.scoped(|resolver| resolver.resolve_expr(then));
                if let Some(otherwise) = otherwise {
                    self.scoped(|resolver| resolver.resolve_expr(otherwise));
                }
            }
            ExprKind::VariableDeclaration {
                name, initializer, ..
            } => {
                // the initializer can't see the name it initializes
                self.resolve_expr(initializer);
                if let Some(unique) = self.declare(name, span) {
                    *name = unique;
                }
            }
            ExprKind::VariableReference(name) => match self.scopes.get(name) {
                Some(unique) => *name = unique.clone(),
                None => {
                    let undeclared = name.clone();
                    self.error(ResolveError::Undeclared(undeclared), span);
                }
            },
            ExprKind::Assignment { target, value } => {
                self.resolve_expr(target);
                self.resolve_expr(value);
            }
            ExprKind::FunctionCall { name, arguments } => {
                // functions live in their own namespace, unless a local shadows them
                if let Some(unique) = self.scopes.get(name) {
                    *name = unique.clone();
                }
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Reporter;
    use crate::grammar::parse_program;

    fn resolve_source(source: &str) -> (Program, Result<(), Vec<ResolveE>>) {
        let meta = SourceMetadata::new(source);
        let mut reporter = Reporter::new();
        let mut program = parse_program(&meta, &mut reporter);
        assert_eq!(reporter.error_count(), 0);
        let result = resolve(&mut program, &meta);
        (program, result)
    }

    #[test]
    fn renames_parameters_and_locals() {
        let (program, result) =
            resolve_source("fn f(a: i64, b: i64): i64 = { c := a + b; c * a };");
        assert!(result.is_ok());
        assert_eq!(
            program.functions[0].to_string(),
            "fn f(a.0: i64, b.1: i64): i64 = { c.2 := (a.0 + b.1); (c.2 * a.0) };"
        );
    }

    #[test]
    fn counter_restarts_per_function() {
        let (program, result) = resolve_source("fn f(): i64 = { x := 1; x };\nfn main(): i64 = { y := 2; y };");
        assert!(result.is_ok());
        assert_eq!(program.functions[1].body.to_string(), "{ y.0 := 2; y.0 }");
    }

    #[test]
    fn shadowing_in_inner_block() {
        let (program, result) = resolve_source("fn main(): i64 = { x := 1; { x := x + 1; x }; x };");
        assert!(result.is_ok());
        assert_eq!(
            program.functions[0].body.to_string(),
            "{ x.0 := 1; { x.1 := (x.0 + 1); x.1 }; x.0 }"
        );
    }

    #[test]
    fn if_branches_get_their_own_frame() {
        let (_, result) = resolve_source("fn main(): i64 = { if true y := 1 else y := 2; y };");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ResolveError::Undeclared("y".into()));
    }

    #[test]
    fn redeclaration_in_same_block() {
        let (program, result) = resolve_source("fn main(): i64 = { x: i64 = 1; x: i64 = 2; x };");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ResolveError::Redefined("x".into()));
        assert_eq!(errors[0].to_string().lines().next(), Some("variable \"x\" redefined"));
        // the second declaration keeps its source name, the reference sees the first
        assert_eq!(
            program.functions[0].body.to_string(),
            "{ x.0: i64 = 1; x: i64 = 2; x.0 }"
        );
    }

    #[test]
    fn undeclared_reference_has_location() {
        let (_, result) = resolve_source("fn main(): i64 =\n  y;");
        let errors = result.unwrap_err();
        let location = errors[0].location().unwrap();
        assert_eq!((location.line, location.col), (2, 3));
    }

    #[test]
    fn duplicate_function() {
        let (_, result) = resolve_source("fn main() = {};\nfn main() = {};");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ResolveError::DuplicateFunction("main".into()));
    }

    #[test]
    fn initializer_sees_outer_binding() {
        let (program, result) = resolve_source("fn main(x: i64): i64 = { x := x; x };");
        assert!(result.is_ok());
        assert_eq!(program.functions[0].body.to_string(), "{ x.1 := x.0; x.1 }");
    }

    #[test]
    fn register_and_runtime_names_are_reserved() {
        let (_, result) = resolve_source(
            "fn rax(): i64 = 1;\nfn r10d(): i64 = 2;\nfn syscall1() = {};\nfn main(): i64 = rax();",
        );
        let kinds: Vec<_> = result.unwrap_err().into_iter().map(|error| error.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResolveError::ReservedFunctionName("rax".into()),
                ResolveError::ReservedFunctionName("r10d".into()),
                ResolveError::ReservedFunctionName("syscall1".into()),
            ]
        );
        // names that merely start like a register are fine
        let (_, result) = resolve_source("fn raxx(): i64 = 1;\nfn main(): i64 = raxx();");
        assert!(result.is_ok());
    }
}
