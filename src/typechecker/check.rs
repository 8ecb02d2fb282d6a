use super::{TypeE, TypeError};
use crate::error::{SourceMetadata, Span};
use crate::tast::{Expr, ExprKind, FunctionDeclaration};
use crate::types::Type;

pub(super) fn check_function(
    function: &FunctionDeclaration,
    source_meta: &SourceMetadata,
    errors: &mut Vec<TypeE>,
) {
    let mut checker = Checker {
        source_meta,
        errors,
    };
    checker.check(&function.body);
    if function.body.ty != function.return_type {
        checker.error(
            TypeError::ReturnMismatch {
                name: function.name.clone(),
                expected: function.return_type.clone(),
                found: function.body.ty.clone(),
            },
            function.span,
        );
    }
}

struct Checker<'a, 'src> {
    source_meta: &'a SourceMetadata<'src>,
    errors: &'a mut Vec<TypeE>,
}

impl Checker<'_, '_> {
    fn error(&mut self, kind: TypeError, span: Span) {
        tracing::debug!(target: "typecheck", "{}", kind);
        self.errors
            .push(TypeE::new(kind).with_source(span, self.source_meta));
    }

    fn check(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Integer(_) | ExprKind::Boolean(_) | ExprKind::VariableReference(_) => (),
            ExprKind::Binary { operator, lhs, rhs } => {
                self.check(lhs);
                self.check(rhs);
                if lhs.ty != rhs.ty {
                    self.error(
                        TypeError::OperandMismatch {
                            operator: *operator,
                            lhs: lhs.ty.clone(),
                            rhs: rhs.ty.clone(),
                        },
                        expr.span,
                    );
                } else if !lhs.ty.supports_operator(*operator) {
                    self.error(
                        TypeError::UnsupportedOperator {
                            operator: *operator,
                            ty: lhs.ty.clone(),
                        },
                        expr.span,
                    );
                }
            }
            ExprKind::Block { expressions, tail } => {
                expressions.iter().chain(tail.as_deref()).for_each(|expr| self.check(expr));
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.check(condition);
                self.check(then);
                if condition.ty != Type::Bool {
                    self.error(TypeError::NonBoolCondition(condition.ty.clone()), condition.span);
                }
                if let Some(otherwise) = otherwise {
                    self.check(otherwise);
                    if then.ty != otherwise.ty {
                        self.error(
                            TypeError::BranchMismatch {
                                then: then.ty.clone(),
                                otherwise: otherwise.ty.clone(),
                            },
                            expr.span,
                        );
                    }
                }
            }
            ExprKind::VariableDeclaration {
                name,
                declared,
                annotated,
                initializer,
            } => {
                self.check(initializer);
                if *annotated && *declared != initializer.ty {
                    self.error(
                        TypeError::AnnotationMismatch {
                            name: name.clone(),
                            declared: declared.clone(),
                            found: initializer.ty.clone(),
                        },
                        expr.span,
                    );
                }
            }
            ExprKind::Assignment {
                target,
                target_type,
                value,
            } => {
                self.check(value);
                if *target_type != value.ty {
                    self.error(
                        TypeError::AssignmentMismatch {
                            name: target.clone(),
                            expected: target_type.clone(),
                            found: value.ty.clone(),
                        },
                        expr.span,
                    );
                }
            }
            ExprKind::FunctionCall {
                name,
                parameters,
                arguments,
            } => {
                arguments.iter().for_each(|argument| self.check(argument));
                if parameters.len() != arguments.len() {
                    self.error(
                        TypeError::ArgumentCount {
                            name: name.clone(),
                            expected: parameters.len(),
                            found: arguments.len(),
                        },
                        expr.span,
                    );
                    return;
                }
                for (index, (expected, argument)) in parameters.iter().zip(arguments).enumerate() {
                    if *expected != argument.ty {
                        self.error(
                            TypeError::ArgumentMismatch {
                                name: name.clone(),
                                index,
                                expected: expected.clone(),
                                found: argument.ty.clone(),
                            },
                            argument.span,
                        );
                    }
                }
            }
        }
    }
}
