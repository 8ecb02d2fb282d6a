use super::{resolve_type_name, Signatures, TypeE, TypeError};
use crate::ast::{self, ExprKind};
use crate::error::{SourceMetadata, Span};
use crate::tast;
use crate::types::{FunctionType, Type};
use std::collections::HashMap;

/// Infers a function body against its collected signature.
/// `None` when some part of the body could not be typed; the reason is in `errors`.
pub(super) fn infer_function(
    function: &ast::FunctionDeclaration,
    signature: &FunctionType,
    signatures: &Signatures,
    source_meta: &SourceMetadata,
    errors: &mut Vec<TypeE>,
) -> Option<tast::FunctionDeclaration> {
    let parameters: Vec<(String, Type)> = function
        .parameters
        .iter()
        .map(|parameter| parameter.name.clone())
        .zip(signature.parameters.iter().cloned())
        .collect();
    let mut inferrer = Inferrer {
        signatures,
        variables: parameters.iter().cloned().collect(),
        source_meta,
        errors,
    };
    let body = inferrer.infer(&function.body)?;
    Some(tast::FunctionDeclaration {
        name: function.name.clone(),
        span: function.span,
        parameters,
        return_type: (*signature.return_type).clone(),
        body,
    })
}

struct Inferrer<'a, 'src> {
    signatures: &'a Signatures,
    // names are unique after resolution, so one flat map per function is enough
    variables: HashMap<String, Type>,
    source_meta: &'a SourceMetadata<'src>,
    errors: &'a mut Vec<TypeE>,
}

impl Inferrer<'_, '_> {
    fn error(&mut self, kind: TypeError, span: Span) {
        tracing::debug!(target: "typecheck", "{}", kind);
        self.errors
            .push(TypeE::new(kind).with_source(span, self.source_meta));
    }

    fn infer_boxed(&mut self, expr: &ast::Expr) -> Option<Box<tast::Expr>> {
        self.infer(expr).map(Box::new)
    }

    /// Both children are always visited, so every error in the tree is found
    fn infer(&mut self, expr: &ast::Expr) -> Option<tast::Expr> {
        let span = expr.span;
        let (kind, ty) = match &expr.kind {
            ExprKind::Integer(value) => (tast::ExprKind::Integer(*value), Type::I64),
            ExprKind::Boolean(value) => (tast::ExprKind::Boolean(*value), Type::Bool),
            ExprKind::Binary { operator, lhs, rhs } => {
                let lhs = self.infer_boxed(lhs);
                let rhs = self.infer_boxed(rhs);
                let (lhs, rhs) = (lhs?, rhs?);
                let ty = if operator.is_comparison() {
                    Type::Bool
                } else {
                    lhs.ty.clone()
                };
                (
                    tast::ExprKind::Binary {
                        operator: *operator,
                        lhs,
                        rhs,
                    },
                    ty,
                )
            }
            ExprKind::Block { expressions, tail } => {
                let expressions: Vec<_> = expressions.iter().map(|expr| self.infer(expr)).collect();
                let tail = tail.as_ref().map(|tail| self.infer_boxed(tail));
                let expressions = expressions.into_iter().collect::<Option<Vec<_>>>()?;
                let tail = match tail {
                    Some(tail) => Some(tail?),
                    None => None,
                };
                let ty = tail.as_ref().map_or(Type::Unit, |tail| tail.ty.clone());
                (tast::ExprKind::Block { expressions, tail }, ty)
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.infer_boxed(condition);
                let then = self.infer_boxed(then);
                let otherwise = otherwise.as_ref().map(|otherwise| self.infer_boxed(otherwise));
                let otherwise = match otherwise {
                    Some(otherwise) => Some(otherwise?),
                    None => None,
                };
                let (condition, then) = (condition?, then?);
                // without an else branch there is no value
                let ty = if otherwise.is_some() {
                    then.ty.clone()
                } else {
                    Type::Unit
                };
                (
                    tast::ExprKind::If {
                        condition,
                        then,
                        otherwise,
                    },
                    ty,
                )
            }
            ExprKind::VariableDeclaration {
                name,
                type_name,
                initializer,
            } => {
                let initializer = self.infer_boxed(initializer);
                let annotated = type_name
                    .as_ref()
                    .map(|type_name| resolve_type_name(type_name, self.source_meta, self.errors));
                let declared = match annotated.clone() {
                    Some(annotation) => annotation,
                    None => initializer.as_ref().map(|init| init.ty.clone()),
                };
                if let Some(declared) = &declared {
                    tracing::trace!(target: "typecheck", "{name}: {declared}");
                    self.variables.insert(name.clone(), declared.clone());
                }
                (
                    tast::ExprKind::VariableDeclaration {
                        name: name.clone(),
                        declared: declared?,
                        annotated: annotated.is_some(),
                        initializer: initializer?,
                    },
                    Type::Unit,
                )
            }
            ExprKind::VariableReference(name) => match self.variables.get(name) {
                Some(ty) => (tast::ExprKind::VariableReference(name.clone()), ty.clone()),
                None => {
                    self.error(TypeError::UnknownVariable(name.clone()), span);
                    return None;
                }
            },
            ExprKind::Assignment { target, value } => {
                let value = self.infer_boxed(value);
                let target = match &target.kind {
                    ExprKind::VariableReference(name) => match self.variables.get(name) {
                        Some(ty) => Some((name.clone(), ty.clone())),
                        None => {
                            self.error(TypeError::UnknownVariable(name.clone()), target.span);
                            None
                        }
                    },
                    _ => {
                        self.error(TypeError::InvalidAssignmentTarget, target.span);
                        None
                    }
                };
                let ((target, target_type), value) = (target?, value?);
                (
                    tast::ExprKind::Assignment {
                        target,
                        target_type,
                        value,
                    },
                    Type::Unit,
                )
            }
            ExprKind::FunctionCall { name, arguments } => {
                let arguments: Vec<_> = arguments.iter().map(|arg| self.infer(arg)).collect();
                let signature = self.lookup_function(name, span);
                let arguments = arguments.into_iter().collect::<Option<Vec<_>>>()?;
                let FunctionType {
                    parameters,
                    return_type,
                } = signature?;
                (
                    tast::ExprKind::FunctionCall {
                        name: name.clone(),
                        parameters,
                        arguments,
                    },
                    *return_type,
                )
            }
            ExprKind::Error => {
                self.error(TypeError::InvalidExpression, span);
                return None;
            }
        };
        Some(tast::Expr { kind, ty, span })
    }

    // a local variable shadows a function of the same name
    fn lookup_function(&mut self, name: &str, span: Span) -> Option<FunctionType> {
        if let Some(ty) = self.variables.get(name) {
            return match ty {
                Type::Function(function) => Some(function.clone()),
                ty => {
                    let ty = ty.clone();
                    self.error(
                        TypeError::NotAFunction {
                            name: name.to_string(),
                            ty,
                        },
                        span,
                    );
                    None
                }
            };
        }
        match self.signatures.get(name) {
            Some(signature) => Some(signature.clone()),
            None => {
                self.error(TypeError::UnknownFunction(name.to_string()), span);
                None
            }
        }
    }
}
