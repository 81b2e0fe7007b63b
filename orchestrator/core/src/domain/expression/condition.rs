// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use tracing::warn;

use super::evaluator::eval;
use super::parser::parse;
use super::{EvalError, EvaluationContext};

/// Boolean façade over the expression interpreter
///
/// Step conditions fail open: a blank condition or one that cannot be
/// evaluated counts as `true`. Only an explicit falsy result skips a step.
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    context: EvaluationContext,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: EvaluationContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn set_context(&mut self, context: EvaluationContext) {
        self.context = context;
    }

    pub fn evaluate(&self, condition: &str) -> bool {
        match self.try_evaluate(condition) {
            Ok(result) => result,
            Err(e) => {
                warn!(condition, error = %e, "Condition evaluation failed, treating as true");
                true
            }
        }
    }

    /// Strict variant used by callers that want to observe the failure
    /// before applying the fail-open rule themselves
    pub fn try_evaluate(&self, condition: &str) -> Result<bool, EvalError> {
        if condition.trim().is_empty() {
            return Ok(true);
        }
        let expr = parse(condition)?;
        Ok(eval(&expr, &self.context)?.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions() -> ConditionEvaluator {
        ConditionEvaluator::with_context(
            EvaluationContext::new()
                .with("current_mode", "EDIT")
                .with("has_selection", false)
                .with("object_count", 3.0),
        )
    }

    #[test]
    fn test_fail_open() {
        let c = conditions();
        assert!(c.evaluate(""));
        assert!(c.evaluate("   "));
        assert!(c.evaluate("not_a_valid_$$$"));
        assert!(c.evaluate("undefined_flag"));
        assert!(c.evaluate("__import__('os').system('x')"));
    }

    #[test]
    fn test_explicit_results() {
        let c = conditions();
        assert!(c.evaluate("current_mode == 'EDIT'"));
        assert!(!c.evaluate("current_mode != 'EDIT'"));
        assert!(!c.evaluate("has_selection"));
        assert!(c.evaluate("not has_selection and object_count > 0"));
        assert!(!c.evaluate("object_count - 3"));
    }

    #[test]
    fn test_try_evaluate_surfaces_errors() {
        let c = conditions();
        assert!(c.try_evaluate("undefined_flag").is_err());
        assert_eq!(c.try_evaluate(""), Ok(true));
    }
}
