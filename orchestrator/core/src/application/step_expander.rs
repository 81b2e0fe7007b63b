// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Step Expander
//!
//! Turns adapted workflow steps into concrete engine calls.
//!
//! The evaluation context is layered, later sources winning:
//!
//! ```text
//! scene variables  <  parameter-schema defaults  <  workflow defaults  <  goal modifiers
//! ```
//!
//! Computed parameters are then resolved on top of it, except those a
//! matched modifier set explicitly. Each step's condition is checked with
//! the fail-open condition evaluator, and every parameter value is resolved
//! recursively: `$CALCULATE(expr)` evaluates an expression, `$name` copies a
//! context variable, anything else passes through untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::events::RoutingEvent;
use crate::domain::expression::{
    ConditionEvaluator, DependencyError, DependencyResolver, EvalError, EvaluationContext,
    Evaluator, Value,
};
use crate::domain::scene::SceneSnapshot;
use crate::domain::workflow::{ParameterSchema, WorkflowDefinition, WorkflowStep};
use crate::infrastructure::event_bus::EventBus;

const CALCULATE_PREFIX: &str = "$CALCULATE(";

/// One operation for the external engine, with fully resolved parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub operation: String,
    pub params: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub calls: Vec<PlannedCall>,
    /// Labels of steps whose condition evaluated to false
    pub skipped_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpansionError {
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error("Step '{step}': failed to calculate parameter '{parameter}': {source}")]
    Calculation {
        step: String,
        parameter: String,
        #[source]
        source: EvalError,
    },

    #[error("Step '{step}': parameter '{parameter}' references unknown variable '${name}'")]
    UnknownReference {
        step: String,
        parameter: String,
        name: String,
    },
}

#[derive(Clone, Default)]
pub struct StepExpander {
    event_bus: Option<EventBus>,
}

impl StepExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Layer scene, schema defaults, workflow defaults and modifiers
    pub fn base_context(
        definition: &WorkflowDefinition,
        scene: &SceneSnapshot,
        modifiers: &BTreeMap<String, JsonValue>,
    ) -> EvaluationContext {
        let mut context = scene.to_context();
        for parameter in &definition.parameters {
            if let Some(value) = parameter.default.as_ref().and_then(Value::from_json) {
                context.set(parameter.name.clone(), value);
            }
        }
        context.extend_from_json(&definition.default_parameters);
        context.extend_from_json(modifiers);
        context
    }

    /// Parameters set by the modifier phrases that actually matched
    pub fn explicit_overrides(
        definition: &WorkflowDefinition,
        matched_keywords: &[String],
    ) -> BTreeSet<String> {
        definition
            .modifiers
            .iter()
            .filter(|m| matched_keywords.contains(&m.phrase))
            .flat_map(|m| m.overrides.keys().cloned())
            .collect()
    }

    pub fn expand(
        &self,
        definition: &WorkflowDefinition,
        steps: &[WorkflowStep],
        base: EvaluationContext,
        explicit_overrides: &BTreeSet<String>,
    ) -> Result<ExpansionResult, ExpansionError> {
        let parameters: Vec<ParameterSchema> = definition
            .parameters
            .iter()
            .filter(|p| !(p.is_computed() && explicit_overrides.contains(&p.name)))
            .cloned()
            .collect();

        let resolved = DependencyResolver::resolve(&parameters, &base)?;
        let mut context = base;
        for (name, value) in resolved {
            context.set(name, value);
        }

        let conditions = ConditionEvaluator::with_context(context.clone());
        let evaluator = Evaluator::with_context(context);

        let mut result = ExpansionResult::default();
        for step in steps {
            if let Some(condition) = step.condition.as_deref() {
                if !self.check_condition(&conditions, definition, step, condition) {
                    result.skipped_steps.push(step.label().to_string());
                    continue;
                }
            }

            let mut params = BTreeMap::new();
            for (name, value) in &step.params {
                params.insert(name.clone(), resolve_value(value, &evaluator, step, name)?);
            }
            result.calls.push(PlannedCall {
                operation: step.operation.clone(),
                params,
            });
        }

        debug!(
            workflow = %definition.name,
            calls = result.calls.len(),
            skipped = result.skipped_steps.len(),
            "Expanded workflow steps"
        );
        Ok(result)
    }

    /// Fail-open: only a condition that evaluates cleanly to false skips the step
    fn check_condition(
        &self,
        conditions: &ConditionEvaluator,
        definition: &WorkflowDefinition,
        step: &WorkflowStep,
        condition: &str,
    ) -> bool {
        match conditions.try_evaluate(condition) {
            Ok(true) => true,
            Ok(false) => {
                debug!(workflow = %definition.name, step = %step.label(), condition, "Step condition false, skipping");
                if let Some(bus) = &self.event_bus {
                    bus.publish(RoutingEvent::StepSkipped {
                        workflow_name: definition.name.clone(),
                        step: step.label().to_string(),
                        reason: format!("condition '{}' is false", condition),
                        skipped_at: Utc::now(),
                    });
                }
                false
            }
            Err(error) => {
                warn!(
                    workflow = %definition.name,
                    step = %step.label(),
                    condition,
                    error = %error,
                    "Condition evaluation failed, keeping step"
                );
                if let Some(bus) = &self.event_bus {
                    bus.publish(RoutingEvent::ConditionFailedOpen {
                        workflow_name: definition.name.clone(),
                        step: step.label().to_string(),
                        condition: condition.to_string(),
                        error: error.to_string(),
                        evaluated_at: Utc::now(),
                    });
                }
                true
            }
        }
    }
}

fn resolve_value(
    value: &JsonValue,
    evaluator: &Evaluator,
    step: &WorkflowStep,
    parameter: &str,
) -> Result<JsonValue, ExpansionError> {
    match value {
        JsonValue::String(text) => {
            if let Some(expression) = calculate_expression(text) {
                let number = evaluator
                    .evaluate(expression)
                    .map_err(|source| ExpansionError::Calculation {
                        step: step.label().to_string(),
                        parameter: parameter.to_string(),
                        source,
                    })?;
                return Ok(JsonValue::from(number));
            }
            if let Some(name) = reference_name(text) {
                return evaluator
                    .context()
                    .get(name)
                    .map(Value::to_json)
                    .ok_or_else(|| ExpansionError::UnknownReference {
                        step: step.label().to_string(),
                        parameter: parameter.to_string(),
                        name: name.to_string(),
                    });
            }
            Ok(value.clone())
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, evaluator, step, parameter))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        JsonValue::Object(entries) => {
            let mut resolved = Map::new();
            for (key, item) in entries {
                resolved.insert(key.clone(), resolve_value(item, evaluator, step, parameter)?);
            }
            Ok(JsonValue::Object(resolved))
        }
        _ => Ok(value.clone()),
    }
}

fn calculate_expression(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix(CALCULATE_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
}

/// `$name` where name is a plain identifier
fn reference_name(text: &str) -> Option<&str> {
    let name = text.trim().strip_prefix('$')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some(name)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{Modifier, ParameterType};
    use serde_json::json;

    fn table() -> WorkflowDefinition {
        WorkflowDefinition::new("table_workflow")
            .with_default("leg_angle", json!(0))
            .with_modifier(
                Modifier::new("wide legs")
                    .with("leg_offset", json!(0.3))
                    .with("leg_angle", json!(10)),
            )
            .with_parameter(
                ParameterSchema::new("table_width", ParameterType::Numeric).with_default(json!(1.2)),
            )
            .with_parameter(
                ParameterSchema::new("leg_offset", ParameterType::Numeric)
                    .computed("table_width / 2 - 0.1", vec!["table_width".to_string()]),
            )
            .with_step(
                WorkflowStep::new("mesh_create_primitive")
                    .with_param("size", json!(["$CALCULATE(table_width)", 0.8, 0.05]))
                    .with_param("name", json!("TableTop")),
            )
            .with_step(
                WorkflowStep::new("mesh_duplicate_leg")
                    .with_param(
                        "transform",
                        json!({"offset": "$leg_offset", "angle": "$leg_angle"}),
                    ),
            )
            .with_step(
                WorkflowStep::new("mesh_bevel")
                    .with_description("bevel edges")
                    .with_condition("current_mode == 'EDIT'"),
            )
    }

    fn expand(goal_modifiers: &[&str]) -> Result<ExpansionResult, ExpansionError> {
        let definition = table();
        let matched: Vec<String> = goal_modifiers.iter().map(|s| s.to_string()).collect();
        let mut modifiers = definition.default_parameters.clone();
        for modifier in &definition.modifiers {
            if matched.contains(&modifier.phrase) {
                modifiers.extend(modifier.overrides.clone());
            }
        }

        let base = StepExpander::base_context(&definition, &SceneSnapshot::default(), &modifiers);
        let explicit = StepExpander::explicit_overrides(&definition, &matched);
        StepExpander::new().expand(&definition, &definition.steps, base, &explicit)
    }

    #[test]
    fn test_calculates_and_substitutes() {
        let result = expand(&[]).unwrap();
        assert_eq!(result.calls.len(), 2);
        assert_eq!(result.calls[0].params["size"], json!([1.2, 0.8, 0.05]));
        assert_eq!(result.calls[0].params["name"], json!("TableTop"));

        let transform = &result.calls[1].params["transform"];
        assert!((transform["offset"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(transform["angle"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_false_condition_skips_step() {
        let result = expand(&[]).unwrap();
        assert_eq!(result.skipped_steps, vec!["bevel edges".to_string()]);
    }

    #[test]
    fn test_modifier_value_is_not_recomputed() {
        let result = expand(&["wide legs"]).unwrap();
        let transform = &result.calls[1].params["transform"];
        assert_eq!(transform["offset"].as_f64(), Some(0.3));
        assert_eq!(transform["angle"].as_f64(), Some(10.0));
    }

    #[tokio::test]
    async fn test_condition_error_fails_open_and_is_published() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let definition = WorkflowDefinition::new("broken_condition")
            .with_step(WorkflowStep::new("mesh_bevel").with_condition("undefined_var > 3"));

        let result = StepExpander::new()
            .with_event_bus(bus)
            .expand(
                &definition,
                &definition.steps,
                EvaluationContext::new(),
                &BTreeSet::new(),
            )
            .unwrap();

        assert_eq!(result.calls.len(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            RoutingEvent::ConditionFailedOpen { .. }
        ));
    }

    #[test]
    fn test_unknown_reference_is_an_error() {
        let definition = WorkflowDefinition::new("t")
            .with_step(WorkflowStep::new("op").with_param("x", json!("$missing")));
        let err = StepExpander::new()
            .expand(&definition, &definition.steps, EvaluationContext::new(), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, ExpansionError::UnknownReference { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_calculation_error_names_step_and_parameter() {
        let definition = WorkflowDefinition::new("t")
            .with_step(WorkflowStep::new("op").with_param("x", json!("$CALCULATE(1 / 0)")));
        let err = StepExpander::new()
            .expand(&definition, &definition.steps, EvaluationContext::new(), &BTreeSet::new())
            .unwrap_err();
        match err {
            ExpansionError::Calculation { step, parameter, source } => {
                assert_eq!(step, "op");
                assert_eq!(parameter, "x");
                assert_eq!(source, EvalError::DivisionByZero);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_identifier_dollar_strings_pass_through() {
        assert_eq!(reference_name("$5 off"), None);
        assert_eq!(reference_name("$width"), Some("width"));
        assert_eq!(calculate_expression(" $CALCULATE(a + (b)) "), Some("a + (b)"));
    }
}
