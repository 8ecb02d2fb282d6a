//! Lowering of the typed tree into the IR.
//! Only runs on a program that checked cleanly, so there is no error path.
use super::{Function, Instruction, NameGenerator, Operand, Program};
use crate::tast::{self, Expr, ExprKind};

/// Lowers every function, in declaration order. Counters start fresh on each call.
pub fn emit(program: &tast::Program) -> Program {
    let mut names = NameGenerator::new();
    let functions: Vec<_> = program
        .functions
        .iter()
        .map(|function| emit_function(function, &mut names))
        .collect();
    let main_function = functions.iter().position(|function| function.name == "main");
    tracing::debug!(target: "irgen", "lowered {} functions", functions.len());
    Program {
        functions,
        main_function,
        names,
    }
}

fn emit_function(function: &tast::FunctionDeclaration, names: &mut NameGenerator) -> Function {
    let has_return_value = !function.return_type.is_unit();
    let mut emitter = FunctionEmitter {
        names,
        instructions: Vec::new(),
    };
    let value = emitter.emit_value(&function.body);
    emitter
        .instructions
        .push(Instruction::Return(has_return_value.then(|| value)));
    let function = Function {
        name: function.name.clone(),
        parameters: function.parameters.iter().map(|(name, _)| name.clone()).collect(),
        has_return_value,
        instructions: emitter.instructions,
    };
    tracing::trace!(target: "irgen::function", "{}", function);
    function
}

struct FunctionEmitter<'a> {
    names: &'a mut NameGenerator,
    instructions: Vec<Instruction>,
}

impl FunctionEmitter<'_> {
    fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn fresh_temp(&mut self) -> Operand {
        Operand::Var(self.names.next_temp())
    }

    /// Where a value is needed but the expression is unit, `0` stands in for it
    fn emit_value(&mut self, expr: &Expr) -> Operand {
        self.emit_expr(expr).unwrap_or(Operand::Constant(0))
    }

    /// Emits the instructions for `expr`, returning the operand holding its value.
    /// Unit expressions have no value.
    fn emit_expr(&mut self, expr: &Expr) -> Option<Operand> {
        match &expr.kind {
            ExprKind::Integer(value) => Some(Operand::Constant(*value)),
            ExprKind::Boolean(value) => Some(Operand::Constant(i64::from(*value))),
            ExprKind::Binary { operator, lhs, rhs } => {
                let lhs = self.emit_value(lhs);
                let rhs = self.emit_value(rhs);
                let dst = self.fresh_temp();
                self.push(Instruction::Binary {
                    operator: *operator,
                    lhs,
                    rhs,
                    dst: dst.clone(),
                });
                Some(dst)
            }
            ExprKind::Block { expressions, tail } => {
                for expr in expressions {
                    self.emit_expr(expr);
                }
                tail.as_ref().and_then(|tail| self.emit_expr(tail))
            }
            ExprKind::If {
                condition,
                then,
                otherwise,
            } => self.emit_if(expr, condition, then, otherwise.as_deref()),
            ExprKind::VariableDeclaration {
                name, initializer, ..
            } => {
                let src = self.emit_value(initializer);
                self.push(Instruction::Copy {
                    src,
                    dst: Operand::Var(name.clone()),
                });
                None
            }
            ExprKind::Assignment { target, value, .. } => {
                let src = self.emit_value(value);
                self.push(Instruction::Copy {
                    src,
                    dst: Operand::Var(target.clone()),
                });
                None
            }
            ExprKind::VariableReference(name) => Some(Operand::Var(name.clone())),
            ExprKind::FunctionCall {
                name, arguments, ..
            } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.emit_value(argument))
                    .collect();
                let result = (!expr.ty.is_unit()).then(|| self.fresh_temp());
                self.push(Instruction::Call {
                    function: name.clone(),
                    arguments,
                    result: result.clone(),
                });
                result
            }
        }
    }

    // cond; jz cond, else; then; jmp end; else: otherwise; end:
    fn emit_if(
        &mut self,
        expr: &Expr,
        condition: &Expr,
        then: &Expr,
        otherwise: Option<&Expr>,
    ) -> Option<Operand> {
        let result = (!expr.ty.is_unit()).then(|| self.fresh_temp());
        let id = self.names.next_label_id();
        let else_label = format!("if_else.{}", id);
        let end_label = format!("if_end.{}", id);

        let value = self.emit_value(condition);
        self.push(Instruction::JumpIfZero {
            value,
            label: else_label.clone(),
        });
        self.emit_branch(then, &result);
        self.push(Instruction::Jump(end_label.clone()));
        self.push(Instruction::Label(else_label));
        if let Some(otherwise) = otherwise {
            self.emit_branch(otherwise, &result);
        }
        self.push(Instruction::Label(end_label));
        result
    }

    fn emit_branch(&mut self, branch: &Expr, result: &Option<Operand>) {
        match result {
            Some(result) => {
                let src = self.emit_value(branch);
                self.push(Instruction::Copy {
                    src,
                    dst: result.clone(),
                });
            }
            None => {
                self.emit_expr(branch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::error::{Reporter, SourceMetadata};

    fn lower(source: &str) -> Program {
        let meta = SourceMetadata::new(source);
        let mut reporter = Reporter::new();
        let mut program = crate::grammar::parse_program(&meta, &mut reporter);
        assert_eq!(reporter.error_count(), 0);
        crate::resolve::resolve(&mut program, &meta).expect("resolution failed");
        let program = crate::typechecker::check_program(&program, &meta).expect("type errors");
        emit(&program)
    }

    fn var(name: &str) -> Operand {
        Operand::Var(name.to_string())
    }

    #[test]
    fn chained_additions() {
        let program = lower("fn main(): i64 = 3 + 3 + 3;");
        let main = program.main().unwrap();
        assert_eq!(
            main.instructions,
            vec![
                Instruction::Binary {
                    operator: BinaryOperator::Add,
                    lhs: Operand::Constant(3),
                    rhs: Operand::Constant(3),
                    dst: var("temp.1"),
                },
                Instruction::Binary {
                    operator: BinaryOperator::Add,
                    lhs: var("temp.1"),
                    rhs: Operand::Constant(3),
                    dst: var("temp.2"),
                },
                Instruction::Return(Some(var("temp.2"))),
            ]
        );
        assert_eq!(
            main.to_string(),
            "fn main\n  temp.1 = add 3, 3\n  temp.2 = add temp.1, 3\n  ret temp.2"
        );
    }

    #[test]
    fn numbering_restarts_per_invocation() {
        let first = lower("fn main(): i64 = 3 + 3 + 3;");
        let second = lower("fn main(): i64 = 3 + 3 + 3;");
        assert_eq!(first.functions, second.functions);
    }

    #[test]
    fn if_else_with_value() {
        let program = lower("fn main(): i64 = if true { 1 } else { 2 };");
        assert_eq!(
            program.functions[0].instructions,
            vec![
                Instruction::JumpIfZero {
                    value: Operand::Constant(1),
                    label: "if_else.1".into(),
                },
                Instruction::Copy {
                    src: Operand::Constant(1),
                    dst: var("temp.1"),
                },
                Instruction::Jump("if_end.1".into()),
                Instruction::Label("if_else.1".into()),
                Instruction::Copy {
                    src: Operand::Constant(2),
                    dst: var("temp.1"),
                },
                Instruction::Label("if_end.1".into()),
                Instruction::Return(Some(var("temp.1"))),
            ]
        );
    }

    #[test]
    fn unit_if_has_no_result() {
        let program = lower("fn main() = { x := 1; if x == 1 { x = 2; } };");
        let text = program.functions[0].to_string();
        assert_eq!(
            text,
            "fn main\n  x.0 = copy 1\n  temp.1 = eq x.0, 1\n  jz temp.1, if_else.1\n  x.0 = copy 2\n  jmp if_end.1\nif_else.1:\nif_end.1:\n  ret"
        );
        assert!(!program.functions[0].has_return_value);
    }

    #[test]
    fn calls_and_parameters() {
        let program = lower(
            "fn add(a: i64, b: i64): i64 = a + b;\nfn nothing() = {};\nfn main(): i64 = { nothing(); add(1, 2) };",
        );
        assert_eq!(program.main_function, Some(2));
        assert_eq!(program.functions[0].parameters, vec!["a.0", "b.1"]);
        assert_eq!(
            program.functions[2].to_string(),
            "fn main\n  call nothing\n  temp.2 = call add 1, 2\n  ret temp.2"
        );
    }

    #[test]
    fn labels_are_unique_across_functions() {
        let program = lower(
            "fn f(): i64 = if true 1 else 2;\nfn main(): i64 = if false 3 else f();",
        );
        let labels: Vec<_> = program
            .functions
            .iter()
            .flat_map(|function| function.instructions.iter())
            .filter_map(|instruction| match instruction {
                Instruction::Label(label) => Some(label.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["if_else.1", "if_end.1", "if_else.2", "if_end.2"]);
    }
}
