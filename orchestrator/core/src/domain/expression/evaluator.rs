// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::cmp::Ordering;
use tracing::debug;

use super::parser::{parse, BinaryOp, CompareOp, Expr, UnaryOp};
use super::{EvalError, EvaluationContext, Value};

/// Numeric façade over the expression interpreter
///
/// Evaluation errors are returned to the caller; [`Evaluator::evaluate_safe`]
/// substitutes a default instead.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    context: EvaluationContext,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: EvaluationContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EvaluationContext {
        &mut self.context
    }

    pub fn set_context(&mut self, context: EvaluationContext) {
        self.context = context;
    }

    /// Evaluate to a number; booleans become `1.0` / `0.0`
    pub fn evaluate(&self, expression: &str) -> Result<f64, EvalError> {
        match self.evaluate_value(expression)? {
            Value::Str(_) => Err(EvalError::TypeError(
                "expression produced a string, expected a number".to_string(),
            )),
            value => value.as_number(),
        }
    }

    pub fn evaluate_safe(&self, expression: &str, default: f64) -> f64 {
        match self.evaluate(expression) {
            Ok(value) => value,
            Err(e) => {
                debug!(expression, error = %e, default, "Expression failed, using default");
                default
            }
        }
    }

    pub fn evaluate_value(&self, expression: &str) -> Result<Value, EvalError> {
        let expr = parse(expression)?;
        eval(&expr, &self.context)
    }
}

/// Evaluate a parsed tree against a context
pub fn eval(expr: &Expr, context: &EvaluationContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Variable(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval(operand, context)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => Ok(Value::Number(-numeric_operand(&value, "unary '-'")?)),
                UnaryOp::Pos => Ok(Value::Number(numeric_operand(&value, "unary '+'")?)),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = numeric_operand(&eval(left, context)?, op.symbol())?;
            let right = numeric_operand(&eval(right, context)?, op.symbol())?;
            arithmetic(*op, left, right).map(Value::Number)
        }
        Expr::Compare { first, rest } => {
            let mut left = eval(first, context)?;
            for (op, operand) in rest {
                let right = eval(operand, context)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::And(left, right) => {
            let left = eval(left, context)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            eval(right, context)
        }
        Expr::Or(left, right) => {
            let left = eval(left, context)?;
            if left.is_truthy() {
                return Ok(left);
            }
            eval(right, context)
        }
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval(condition, context)?.is_truthy() {
                eval(then_branch, context)
            } else {
                eval(else_branch, context)
            }
        }
        Expr::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| {
                    let value = eval(arg, context)?;
                    numeric_operand(&value, function.name())
                })
                .collect::<Result<Vec<_>, _>>()?;
            function.apply(&values).map(Value::Number)
        }
    }
}

fn numeric_operand(value: &Value, operation: &str) -> Result<f64, EvalError> {
    match value {
        Value::Str(_) => Err(EvalError::TypeError(format!(
            "unsupported operand type for {}: string",
            operation
        ))),
        other => other.as_number(),
    }
}

fn arithmetic(op: BinaryOp, left: f64, right: f64) -> Result<f64, EvalError> {
    let result = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div => {
            if right == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            left / right
        }
        BinaryOp::FloorDiv => {
            if right == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (left / right).floor()
        }
        BinaryOp::Mod => {
            if right == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // Result takes the sign of the divisor
            left - right * (left / right).floor()
        }
        BinaryOp::Pow => left.powf(right),
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(EvalError::NonFinite(format!("'{}'", op.symbol())))
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => match op {
            CompareOp::Eq => Ok(a == b),
            CompareOp::NotEq => Ok(a != b),
            _ => Err(EvalError::TypeError(format!(
                "'{}' is not supported between strings",
                op.symbol()
            ))),
        },
        (Value::Str(_), _) | (_, Value::Str(_)) => match op {
            CompareOp::Eq => Ok(false),
            CompareOp::NotEq => Ok(true),
            _ => Err(EvalError::TypeError(format!(
                "'{}' is not supported between a string and a number",
                op.symbol()
            ))),
        },
        _ => {
            let ordering = left.as_number()?.partial_cmp(&right.as_number()?);
            Ok(match op {
                CompareOp::Eq => ordering == Some(Ordering::Equal),
                CompareOp::NotEq => ordering != Some(Ordering::Equal),
                CompareOp::Lt => ordering == Some(Ordering::Less),
                CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Gt => ordering == Some(Ordering::Greater),
                CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> Evaluator {
        Evaluator::with_context(
            EvaluationContext::new()
                .with("width", 1.5)
                .with("height", 0.75)
                .with("leg_count", 4.0)
                .with("current_mode", "EDIT")
                .with("has_selection", true),
        )
    }

    #[test]
    fn test_arithmetic() {
        let e = evaluator();
        assert_eq!(e.evaluate("width * 2 + 1").unwrap(), 4.0);
        assert_eq!(e.evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(e.evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(e.evaluate("7 // 2").unwrap(), 3.0);
        assert_eq!(e.evaluate("-7 // 2").unwrap(), -4.0);
        assert_eq!(e.evaluate("-7 % 3").unwrap(), 2.0);
        assert_eq!(e.evaluate("7 % -3").unwrap(), -2.0);
        assert_eq!(e.evaluate("(width + height) / 2").unwrap(), 1.125);
    }

    #[test]
    fn test_conditional_expressions() {
        let e = evaluator();
        assert_eq!(e.evaluate("1 if 0 < 5 < 10 else 0").unwrap(), 1.0);
        assert_eq!(e.evaluate("10 if width > 1.0 else 5").unwrap(), 10.0);
        assert_eq!(e.evaluate("10 if width > 2.0 else 5").unwrap(), 5.0);
        assert_eq!(e.evaluate("1 if 5 < 3 < undefined_name else 0").unwrap(), 0.0);
    }

    #[test]
    fn test_booleans_as_numbers() {
        let e = evaluator();
        assert_eq!(e.evaluate("has_selection").unwrap(), 1.0);
        assert_eq!(e.evaluate("width > 1").unwrap(), 1.0);
        assert_eq!(e.evaluate("not True").unwrap(), 0.0);
        assert_eq!(e.evaluate("True + True").unwrap(), 2.0);
    }

    #[test]
    fn test_short_circuit() {
        let e = evaluator();
        assert_eq!(e.evaluate("0 and missing").unwrap(), 0.0);
        assert_eq!(e.evaluate("leg_count or missing").unwrap(), 4.0);
        assert!(e.evaluate("1 and missing").is_err());
    }

    #[test]
    fn test_strings() {
        let e = evaluator();
        assert_eq!(
            e.evaluate_value("current_mode == 'EDIT'").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            e.evaluate_value("current_mode != \"OBJECT\"").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(e.evaluate_value("current_mode == 1").unwrap(), Value::Bool(false));
        assert!(matches!(e.evaluate("current_mode + 1"), Err(EvalError::TypeError(_))));
        assert!(matches!(e.evaluate("-current_mode"), Err(EvalError::TypeError(_))));
        assert!(matches!(e.evaluate("current_mode < 'Z'"), Err(EvalError::TypeError(_))));
        assert!(matches!(e.evaluate("current_mode"), Err(EvalError::TypeError(_))));
    }

    #[test]
    fn test_functions() {
        let e = evaluator();
        assert_eq!(e.evaluate("max(width, height, 2)").unwrap(), 2.0);
        assert_eq!(e.evaluate("round(width * 3)").unwrap(), 4.0);
        assert_eq!(e.evaluate("floor(-0.5)").unwrap(), -1.0);
        assert!((e.evaluate("degrees(atan2(1, 1))").unwrap() - 45.0).abs() < 1e-9);
        assert_eq!(e.evaluate("hypot(3, 4)").unwrap(), 5.0);
    }

    #[test]
    fn test_errors() {
        let e = evaluator();
        assert_eq!(e.evaluate("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(e.evaluate("1 % 0"), Err(EvalError::DivisionByZero));
        assert_eq!(
            e.evaluate("depth * 2"),
            Err(EvalError::UnknownVariable("depth".to_string()))
        );
        assert!(matches!(e.evaluate("10 ** 400"), Err(EvalError::NonFinite(_))));
        assert!(matches!(e.evaluate("sqrt(-1)"), Err(EvalError::NonFinite(_))));
    }

    #[test]
    fn test_evaluate_safe() {
        let e = evaluator();
        assert_eq!(e.evaluate_safe("width * 2", 0.0), 3.0);
        assert_eq!(e.evaluate_safe("undefined * 2", 7.0), 7.0);
        assert_eq!(e.evaluate_safe("__import__('os')", -1.0), -1.0);
    }
}
