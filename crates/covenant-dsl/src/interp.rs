//! Tree-walking interpreter for compiled constraint ASTs.
//!
//! Stateless across calls: model, state, function table and diagnostics
//! sink are supplied per call, so one AST can be interpreted repeatedly
//! against changing data. Runtime faults (missing attribute, unregistered
//! function, division by zero, operand type mismatch) are reported to the
//! [`Diagnostics`] sink and the faulting node evaluates to `false`; the
//! interpreter itself never fails.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Ast, Expr, VarPrefix};
use crate::diag::Diagnostics;
use crate::token::{Literal, Token, TokenKind};
use crate::value::Value;

/// A registered callable. Functions receive their evaluated call-site
/// arguments; statements (zero call-site arguments) receive the whole
/// model and state as two arguments.
pub type NativeFn = dyn Fn(&[Value]) -> Value;

/// Duplicate registration error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Function with name '{name}' is already registered")]
pub struct DuplicateFunction {
    pub name: String,
}

/// The function table shared by all constraints of a system.
///
/// Iteration order is registration order. The generation counter is bumped
/// on every registration so text processors can detect that a previous
/// scan is stale (fragment recognition depends on the registered names).
#[derive(Clone, Default)]
pub struct Functions {
    table: IndexMap<String, Rc<NativeFn>>,
    generation: u64,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Value + 'static,
    ) -> Result<(), DuplicateFunction> {
        let name = name.into();
        if self.table.contains_key(&name) {
            return Err(DuplicateFunction { name });
        }
        self.table.insert(name, Rc::new(function));
        self.generation += 1;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rc<NativeFn>> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl std::fmt::Debug for Functions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functions")
            .field("names", &self.table.keys().collect::<Vec<_>>())
            .field("generation", &self.generation)
            .finish()
    }
}

struct InterpContext<'a> {
    model: &'a serde_json::Value,
    state: &'a serde_json::Value,
    functions: &'a Functions,
    source: &'a str,
    diags: &'a mut Diagnostics,
}

/// Interpret a compiled AST against a model, a state and a function table.
pub fn interpret(
    ast: &Ast,
    model: &serde_json::Value,
    state: &serde_json::Value,
    functions: &Functions,
    diags: &mut Diagnostics,
) -> Value {
    let mut cx = InterpContext {
        model,
        state,
        functions,
        source: &ast.source,
        diags,
    };
    eval(&ast.root, &mut cx)
}

fn eval(expr: &Expr, cx: &mut InterpContext<'_>) -> Value {
    match expr {
        Expr::Constraint {
            activation,
            assertion,
        } => {
            // A constraint vacuously holds when its activation is false.
            if eval(activation, cx).is_truthy() {
                eval(assertion, cx)
            } else {
                Value::Bool(true)
            }
        }
        Expr::Binary {
            left,
            operator,
            right,
        } => {
            let left = eval(left, cx);
            let right = eval(right, cx);
            eval_binary(&left, operator, &right, cx)
        }
        Expr::Logical {
            left,
            operator,
            right,
        } => {
            // Short-circuit: the deciding operand is returned unconverted.
            let left = eval(left, cx);
            let is_or = matches!(operator.kind, TokenKind::PipePipe | TokenKind::Or);
            if is_or == left.is_truthy() {
                left
            } else {
                eval(right, cx)
            }
        }
        Expr::Unary { operator, right } => {
            let right = eval(right, cx);
            if operator.kind == TokenKind::Minus {
                match right.as_number() {
                    Some(n) => Value::Number(-n),
                    None => {
                        cx.diags.runtime(
                            cx.source,
                            "Operand of '-' must be a number",
                            operator.position,
                        );
                        Value::Bool(false)
                    }
                }
            } else {
                Value::Bool(!right.is_truthy())
            }
        }
        Expr::Grouping { inner } => eval(inner, cx),
        Expr::Literal { value } => match &value.literal {
            Some(Literal::Number(n)) => Value::Number(*n),
            Some(Literal::Str(s)) => Value::Str(s.clone()),
            Some(Literal::Bool(b)) => Value::Bool(*b),
            None => Value::Null,
        },
        Expr::Variable { prefix, path } => eval_variable(prefix, path, cx),
        Expr::Function { name, args } => eval_function(name, args, cx),
    }
}

fn eval_binary(
    left: &Value,
    operator: &Token,
    right: &Value,
    cx: &mut InterpContext<'_>,
) -> Value {
    match operator.kind {
        TokenKind::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            _ if left.as_str().is_some() || right.as_str().is_some() => {
                Value::Str(format!("{left}{right}"))
            }
            _ => type_error(operator, "Operands of '+' must be numbers or strings", cx),
        },
        TokenKind::Minus | TokenKind::Star => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => {
                if operator.kind == TokenKind::Minus {
                    Value::Number(a - b)
                } else {
                    Value::Number(a * b)
                }
            }
            _ => type_error(operator, "Operands must be numbers", cx),
        },
        TokenKind::Slash | TokenKind::Percent => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => {
                if b == 0.0 {
                    cx.diags
                        .runtime(cx.source, "Division by zero", operator.position);
                    return Value::Bool(false);
                }
                if operator.kind == TokenKind::Slash {
                    Value::Number(a / b)
                } else {
                    Value::Number(a % b)
                }
            }
            _ => type_error(operator, "Operands must be numbers", cx),
        },
        TokenKind::EqualEqual => Value::Bool(left.loose_eq(right)),
        TokenKind::BangEqual => Value::Bool(!left.loose_eq(right)),
        TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(ord) => {
                    let holds = match operator.kind {
                        TokenKind::Greater => ord.is_gt(),
                        TokenKind::GreaterEqual => ord.is_ge(),
                        TokenKind::Less => ord.is_lt(),
                        _ => ord.is_le(),
                    };
                    Value::Bool(holds)
                }
                None => type_error(
                    operator,
                    "Operands must both be numbers or both be strings",
                    cx,
                ),
            }
        }
        // unreachable by grammar
        _ => Value::Bool(false),
    }
}

fn type_error(operator: &Token, message: &str, cx: &mut InterpContext<'_>) -> Value {
    cx.diags.runtime(cx.source, message, operator.position);
    Value::Bool(false)
}

fn eval_variable(prefix: &Token, path: &[Token], cx: &mut InterpContext<'_>) -> Value {
    let which = Expr::var_prefix(prefix);
    let base = match which {
        VarPrefix::Model => cx.model,
        VarPrefix::State => cx.state,
    };
    if path.is_empty() {
        return Value::from_json(base.clone());
    }
    let mut current = base;
    for segment in path {
        match current.get(&segment.lexeme) {
            Some(next) => current = next,
            None => {
                cx.diags.runtime(
                    cx.source,
                    format!(
                        "Given {} has no attribute '{}'",
                        which.noun(),
                        segment.lexeme
                    ),
                    segment.position,
                );
                return Value::Bool(false);
            }
        }
    }
    Value::from_json(current.clone())
}

fn eval_function(name: &Token, args: &[Expr], cx: &mut InterpContext<'_>) -> Value {
    let Some(function) = cx.functions.get(&name.lexeme).cloned() else {
        cx.diags.runtime(
            cx.source,
            format!("Function '{}' is not registered", name.lexeme),
            name.position,
        );
        return Value::Bool(false);
    };
    let evaluated: Vec<Value> = if args.is_empty() {
        // Statement call: the model and state are passed implicitly.
        vec![
            Value::from_json(cx.model.clone()),
            Value::from_json(cx.state.clone()),
        ]
    } else {
        args.iter().map(|arg| eval(arg, cx)).collect()
    };
    function(&evaluated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser::Parser;
    use serde_json::json;

    fn run(
        source: &str,
        model: serde_json::Value,
        state: serde_json::Value,
        functions: &Functions,
    ) -> (Value, usize) {
        let tokens = lexer::scan(source, 0).unwrap();
        let ast = Parser::parse(source, &tokens).unwrap();
        let mut diags = Diagnostics::new();
        let value = interpret(&ast, &model, &state, functions, &mut diags);
        (value, diags.len())
    }

    fn eval_clean(source: &str) -> Value {
        let (value, faults) = run(source, json!(null), json!(null), &Functions::new());
        assert_eq!(faults, 0, "unexpected diagnostics for {source:?}");
        value
    }

    #[test]
    fn trivial_expressions() {
        assert_eq!(eval_clean("ALWAYS: 4 + 4 * 2"), Value::Number(12.0));
        assert_eq!(eval_clean("ALWAYS: 42 > 42"), Value::Bool(false));
        assert_eq!(eval_clean("ALWAYS: 42 >= 42"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: 42 == 42"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: 42 != 42"), Value::Bool(false));
        assert_eq!(eval_clean("ALWAYS: 42 != -42"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: 42 <= 42"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: 42 < 42"), Value::Bool(false));
        assert_eq!(
            eval_clean("ALWAYS: (1 + (2 * (3 + 4) + 5) - 6 + (7 + 8 + 1)) / 3.0"),
            Value::Number(10.0)
        );
    }

    #[test]
    fn model_and_state_variables() {
        let model = json!({"value": 10, "nested": {"value": 20}});
        let state = json!({"first": 30, "second": {"third": 40}});
        let fns = Functions::new();
        let (v, _) = run("ALWAYS: $value == #first / 3", model.clone(), state.clone(), &fns);
        assert_eq!(v, Value::Bool(true));
        let (v, _) = run(
            "ALWAYS: $nested.value == #second.third / 2",
            model.clone(),
            state.clone(),
            &fns,
        );
        assert_eq!(v, Value::Bool(true));
        let (v, _) = run("ALWAYS: $", model.clone(), state.clone(), &fns);
        assert_eq!(v, Value::Json(model));
        let (v, _) = run("ALWAYS: #", json!({}), state.clone(), &fns);
        assert_eq!(v, Value::Json(state));
    }

    #[test]
    fn missing_attribute_reports_and_yields_false() {
        let (v, faults) = run("ALWAYS: $x > 1", json!({"y": 2}), json!(null), &Functions::new());
        // The failed lookup evaluates to false; the comparison then faults
        // again on the non-number operand.
        assert_eq!(faults, 2);
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn division_and_modulo_by_zero_report_and_yield_false() {
        let (v, faults) = run("ALWAYS: 1 / 0", json!(null), json!(null), &Functions::new());
        assert_eq!((v, faults), (Value::Bool(false), 1));
        let (v, faults) = run("ALWAYS: 1 % 0", json!(null), json!(null), &Functions::new());
        assert_eq!((v, faults), (Value::Bool(false), 1));
    }

    #[test]
    fn function_calls() {
        let mut fns = Functions::new();
        fns.register("LENGTH", |args: &[Value]| {
            Value::Number(args[0].to_string().chars().count() as f64)
        })
        .unwrap();
        fns.register("TRUE", |_: &[Value]| Value::Bool(true)).unwrap();
        fns.register("FALSE", |_: &[Value]| Value::Bool(false)).unwrap();

        let (v, _) = run("ALWAYS: LENGTH('Testing')", json!(null), json!(null), &fns);
        assert_eq!(v, Value::Number(7.0));
        let (v, _) = run("ALWAYS: LENGTH('Test ing')", json!(null), json!(null), &fns);
        assert_eq!(v, Value::Number(8.0));
        let (v, _) = run("ALWAYS: TRUE AND FALSE", json!(null), json!(null), &fns);
        assert_eq!(v, Value::Bool(false));
        let (v, _) = run("ALWAYS: TRUE AND TRUE", json!(null), json!(null), &fns);
        assert_eq!(v, Value::Bool(true));
        let (v, _) = run("ALWAYS: FALSE OR TRUE", json!(null), json!(null), &fns);
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn unregistered_function_reports_and_yields_false() {
        let (v, faults) = run(
            "ALWAYS: myUnregisteredFunc() == 9",
            json!(null),
            json!(null),
            &Functions::new(),
        );
        assert_eq!(faults, 1);
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn statements_receive_model_and_state() {
        let mut fns = Functions::new();
        fns.register("SUM", |args: &[Value]| {
            let model = match &args[0] {
                Value::Json(v) => v["value"].as_f64().unwrap_or(0.0),
                _ => 0.0,
            };
            let state = match &args[1] {
                Value::Json(v) => v["superior"].as_f64().unwrap_or(0.0),
                _ => 0.0,
            };
            Value::Number(model + state)
        })
        .unwrap();
        let (v, _) = run(
            "ALWAYS: SUM == 85",
            json!({"value": 42}),
            json!({"superior": 43}),
            &fns,
        );
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn inactive_constraint_is_vacuously_true() {
        let (v, faults) = run(
            "WHEN 1 > 2 : 1 / 0 == 4",
            json!(null),
            json!(null),
            &Functions::new(),
        );
        // The assertion is never evaluated, so no diagnostic either.
        assert_eq!((v, faults), (Value::Bool(true), 0));
    }

    #[test]
    fn logical_operators_return_the_deciding_operand() {
        assert_eq!(eval_clean("ALWAYS: 0 || 42"), Value::Number(42.0));
        assert_eq!(eval_clean("ALWAYS: 7 || 42"), Value::Number(7.0));
        assert_eq!(eval_clean("ALWAYS: 0 && 42"), Value::Number(0.0));
        assert_eq!(eval_clean("ALWAYS: 7 && 42"), Value::Number(42.0));
    }

    #[test]
    fn string_concatenation_and_comparison() {
        assert_eq!(eval_clean("ALWAYS: 'a' + 'b'"), Value::Str("ab".into()));
        assert_eq!(eval_clean("ALWAYS: 'n ' + 4"), Value::Str("n 4".into()));
        assert_eq!(eval_clean("ALWAYS: 'a' < 'b'"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: 'a' == 'a'"), Value::Bool(true));
    }

    #[test]
    fn negation() {
        assert_eq!(eval_clean("ALWAYS: -(2 + 3)"), Value::Number(-5.0));
        assert_eq!(eval_clean("ALWAYS: !0"), Value::Bool(true));
        assert_eq!(eval_clean("ALWAYS: NOT 'text'"), Value::Bool(false));
        assert_eq!(eval_clean("ALWAYS: NOT NOT 1"), Value::Bool(true));
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut fns = Functions::new();
        fns.register("F", |_: &[Value]| Value::Null).unwrap();
        let err = fns.register("F", |_: &[Value]| Value::Null).unwrap_err();
        assert_eq!(err.name, "F");
    }
}
