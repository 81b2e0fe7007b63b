// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Computed parameter resolution
//!
//! Computed parameters form a graph through their `depends_on` lists. The
//! resolver orders them with Kahn's algorithm, always taking the earliest
//! declared ready parameter so the order is stable across runs, then
//! evaluates each one over a context that grows with every resolved value.

use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use super::{EvalError, EvaluationContext, Evaluator};
use crate::domain::workflow::ParameterSchema;

/// Computed parameter values by name
pub type ResolvedParameters = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DependencyError {
    #[error("Circular dependency among parameters: {}", parameters.join(", "))]
    CircularDependency { parameters: Vec<String> },

    #[error("Failed to compute parameter '{parameter}' from '{expression}': {source}")]
    Evaluation {
        parameter: String,
        expression: String,
        #[source]
        source: EvalError,
    },
}

pub struct DependencyResolver;

impl DependencyResolver {
    /// Order computed parameters so every one comes after the computed
    /// parameters it depends on. Non-computed dependencies are external
    /// inputs and impose no ordering.
    pub fn resolution_order(parameters: &[ParameterSchema]) -> Result<Vec<String>, DependencyError> {
        let computed: Vec<&ParameterSchema> =
            parameters.iter().filter(|p| p.is_computed()).collect();
        let computed_names: HashSet<&str> = computed.iter().map(|p| p.name.as_str()).collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for param in &computed {
            let mut seen = HashSet::new();
            for dep in &param.depends_on {
                if computed_names.contains(dep.as_str()) && seen.insert(dep.as_str()) {
                    dependents
                        .entry(dep.as_str())
                        .or_default()
                        .push(param.name.as_str());
                }
            }
            in_degree.insert(param.name.as_str(), seen.len());
        }

        let mut order = Vec::with_capacity(computed.len());
        let mut done: HashSet<&str> = HashSet::new();

        while order.len() < computed.len() {
            let next = computed
                .iter()
                .map(|p| p.name.as_str())
                .find(|name| !done.contains(name) && in_degree.get(name) == Some(&0));

            let Some(name) = next else {
                let parameters = computed
                    .iter()
                    .map(|p| p.name.clone())
                    .filter(|name| !done.contains(name.as_str()))
                    .collect();
                return Err(DependencyError::CircularDependency { parameters });
            };

            done.insert(name);
            order.push(name.to_string());

            if let Some(children) = dependents.get(name) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree = degree.saturating_sub(1);
                    }
                }
            }
        }

        Ok(order)
    }

    /// Evaluate every computed parameter in dependency order. Any failure
    /// aborts the whole resolution.
    pub fn resolve(
        parameters: &[ParameterSchema],
        base: &EvaluationContext,
    ) -> Result<ResolvedParameters, DependencyError> {
        let order = Self::resolution_order(parameters)?;
        let by_name: HashMap<&str, &ParameterSchema> =
            parameters.iter().map(|p| (p.name.as_str(), p)).collect();

        let mut evaluator = Evaluator::with_context(base.clone());
        let mut resolved = ResolvedParameters::new();

        for name in order {
            let Some(expression) = by_name.get(name.as_str()).and_then(|p| p.computed.as_deref())
            else {
                continue;
            };

            let value = evaluator
                .evaluate(expression)
                .map_err(|source| DependencyError::Evaluation {
                    parameter: name.clone(),
                    expression: expression.to_string(),
                    source,
                })?;

            evaluator.context_mut().set(name.clone(), value);
            resolved.insert(name, value);
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::ParameterType;

    fn computed(name: &str, expression: &str, depends_on: &[&str]) -> ParameterSchema {
        ParameterSchema::new(name, ParameterType::Numeric)
            .computed(expression, depends_on.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_resolves_dependencies_in_either_declaration_order() {
        let forward = vec![computed("a", "b * 2", &["b"]), computed("b", "3", &[])];
        let backward = vec![computed("b", "3", &[]), computed("a", "b * 2", &["b"])];

        for params in [forward, backward] {
            let resolved = DependencyResolver::resolve(&params, &EvaluationContext::new()).unwrap();
            assert_eq!(resolved.get("b"), Some(&3.0));
            assert_eq!(resolved.get("a"), Some(&6.0));
        }
    }

    #[test]
    fn test_order_is_declaration_stable() {
        let params = vec![
            computed("top_height", "height - 0.05", &[]),
            computed("leg_length", "top_height - 0.02", &["top_height"]),
            computed("leg_offset", "width / 2 - 0.1", &[]),
        ];
        assert_eq!(
            DependencyResolver::resolution_order(&params).unwrap(),
            vec!["top_height", "leg_length", "leg_offset"]
        );
    }

    #[test]
    fn test_external_dependencies_come_from_context() {
        let params = vec![
            ParameterSchema::new("width", ParameterType::Numeric),
            computed("half_width", "width / 2", &["width"]),
        ];
        let context = EvaluationContext::new().with("width", 1.2);
        let resolved = DependencyResolver::resolve(&params, &context).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!((resolved["half_width"] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_self_cycle() {
        let params = vec![computed("a", "a + 1", &["a"])];
        assert_eq!(
            DependencyResolver::resolution_order(&params),
            Err(DependencyError::CircularDependency {
                parameters: vec!["a".to_string()]
            })
        );
    }

    #[test]
    fn test_mutual_cycle_names_both() {
        let params = vec![
            computed("ok", "1", &[]),
            computed("a", "b + 1", &["b"]),
            computed("b", "a + 1", &["a"]),
        ];
        let err = DependencyResolver::resolve(&params, &EvaluationContext::new()).unwrap_err();
        assert_eq!(
            err,
            DependencyError::CircularDependency {
                parameters: vec!["a".to_string(), "b".to_string()]
            }
        );
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_evaluation_failure_aborts() {
        let params = vec![
            computed("a", "1", &[]),
            computed("b", "missing * 2", &[]),
        ];
        let err = DependencyResolver::resolve(&params, &EvaluationContext::new()).unwrap_err();
        match err {
            DependencyError::Evaluation { parameter, source, .. } => {
                assert_eq!(parameter, "b");
                assert_eq!(source, EvalError::UnknownVariable("missing".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
