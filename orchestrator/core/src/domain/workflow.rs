// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Domain Model
//!
//! Workflow definitions describe a reusable, parameterized sequence of scene
//! operations together with everything the router needs to pick and tailor
//! them: trigger keywords and pattern, modifier phrases, computed parameters
//! and optional steps.
//!
//! # Architectural Context
//!
//! - **Bounded Context:** Routing Context
//! - **Aggregate Root:** WorkflowDefinition
//!
//! # Design Principles
//!
//! 1. **Immutability:** Definitions are never mutated after load; adaptation
//!    produces a new filtered step list
//! 2. **Self-Validating:** [`WorkflowDefinition::validate`] enforces the load-time
//!    invariants before a definition can enter the registry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

use crate::domain::expression::{DependencyError, DependencyResolver};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[serde(alias = "number", alias = "float", alias = "int", alias = "integer")]
    Numeric,
    #[serde(alias = "str")]
    String,
}

/// Declared workflow parameter, optionally computed from an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSchema {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            computed: None,
            depends_on: Vec::new(),
            default: None,
            description: None,
        }
    }

    pub fn computed(mut self, expression: impl Into<String>, depends_on: Vec<String>) -> Self {
        self.computed = Some(expression.into());
        self.depends_on = depends_on;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }
}

/// A trigger phrase and the parameter overrides it applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub phrase: String,
    pub overrides: BTreeMap<String, Value>,
}

impl Modifier {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with(mut self, parameter: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(parameter.into(), value);
        self
    }
}

/// One operation in a workflow
///
/// Parameter values may be literals, `$name` context references or
/// `$CALCULATE(expr)` expressions, nested inside arrays and maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub operation: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl WorkflowStep {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: BTreeMap::new(),
            description: None,
            condition: None,
            optional: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Mark the step optional with the given tags
    pub fn optional<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional = true;
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Label used in reports: the description if present, else the operation
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.operation)
    }
}

// ============================================================================
// Aggregate Root: WorkflowDefinition
// ============================================================================

/// Workflow Aggregate Root
///
/// # Invariants
/// - `name` is non-empty (and unique across the registry)
/// - At least one step, each with a non-empty operation
/// - Parameter names are unique; every `depends_on` entry names a declared parameter
/// - Computed parameters do not form a dependency cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub trigger_keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_pattern: Option<String>,
    #[serde(default)]
    pub sample_prompts: Vec<String>,
    #[serde(default)]
    pub default_parameters: BTreeMap<String, Value>,
    /// Declaration order matters: later modifiers win on overlapping parameters
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            trigger_keywords: BTreeSet::new(),
            trigger_pattern: None,
            sample_prompts: Vec::new(),
            default_parameters: BTreeMap::new(),
            modifiers: Vec::new(),
            parameters: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trigger_keywords
            .extend(keywords.into_iter().map(|k| k.into().to_lowercase()));
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.trigger_pattern = Some(pattern.into());
        self
    }

    pub fn with_sample_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.sample_prompts.push(prompt.into());
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.default_parameters.insert(name.into(), value);
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSchema) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::InvalidWorkflowName(
                "Workflow name cannot be empty".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(WorkflowError::NoSteps(self.name.clone()));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.operation.trim().is_empty() {
                return Err(WorkflowError::EmptyOperation { index });
            }
        }

        let mut declared = HashSet::new();
        for parameter in &self.parameters {
            if !declared.insert(parameter.name.as_str()) {
                return Err(WorkflowError::DuplicateParameter(parameter.name.clone()));
            }
        }

        for parameter in &self.parameters {
            for dependency in &parameter.depends_on {
                if !declared.contains(dependency.as_str()) {
                    return Err(WorkflowError::UnknownDependency {
                        parameter: parameter.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        DependencyResolver::resolution_order(&self.parameters).map_err(|e| match e {
            DependencyError::CircularDependency { parameters } => {
                WorkflowError::CircularDependency(parameters)
            }
            other => WorkflowError::InvalidParameter(other.to_string()),
        })?;

        Ok(())
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn computed_parameters(&self) -> impl Iterator<Item = &ParameterSchema> {
        self.parameters.iter().filter(|p| p.is_computed())
    }

    pub fn core_steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.iter().filter(|s| !s.optional)
    }

    pub fn optional_steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.iter().filter(|s| s.optional)
    }

    /// Text indexed for semantic matching
    pub fn semantic_text(&self) -> String {
        let mut parts = vec![self.name.replace(['_', '-'], " ")];
        if let Some(description) = &self.description {
            parts.push(description.clone());
        }
        if !self.trigger_keywords.is_empty() {
            parts.push(
                self.trigger_keywords
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        parts.extend(self.sample_prompts.iter().cloned());
        parts.join(". ")
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow name: {0}")]
    InvalidWorkflowName(String),

    #[error("Workflow '{0}' must have at least one step")]
    NoSteps(String),

    #[error("Step {index} has an empty operation")]
    EmptyOperation { index: usize },

    #[error("Parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("Parameter '{parameter}' depends on undeclared parameter '{dependency}'")]
    UnknownDependency { parameter: String, dependency: String },

    #[error("Circular dependency among computed parameters: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
