// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Definition Parser
//!
//! This module provides infrastructure for parsing workflow definition files
//! into domain objects.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external YAML/JSON → Domain objects
//! - **Anti-Corruption:** Translates the file schema to the domain model
//!
//! # Definition Format
//!
//! ```yaml
//! name: table_workflow
//! description: Four-legged table with optional bench
//! trigger_keywords: [table, stół]
//! trigger_pattern: table_like
//! sample_prompts:
//!   - make a dining table
//! defaults:
//!   leg_angle: 0
//! modifiers:                 # ordered; later phrases win on overlap
//!   angled legs:
//!     leg_angle: 15
//!   straight legs:
//!     leg_angle: 0
//! parameters:                # ordered
//!   table_width:
//!     type: numeric
//!     default: 1.2
//!   leg_offset:
//!     type: numeric
//!     computed: "table_width / 2 - 0.1"
//!     depends_on: [table_width]
//! steps:
//!   - tool: mesh_create_primitive
//!     params:
//!       size: ["$CALCULATE(table_width)", 0.8, 0.05]
//!   - tool: mesh_add_bench
//!     optional: true
//!     tags: [bench, seating]
//!     description: add a bench alongside the table
//! ```
//!
//! JSON files use the same keys. Both go through `serde_yaml`, whose
//! mappings keep declaration order for `modifiers` and `parameters`.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::domain::workflow::{
    Modifier, ParameterSchema, ParameterType, WorkflowDefinition, WorkflowStep,
};

// ============================================================================
// File Schema (External Representation)
// ============================================================================

/// External representation of a workflow definition file
///
/// Converted to [`WorkflowDefinition`] and validated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_pattern: Option<String>,
    #[serde(default)]
    pub sample_prompts: Vec<String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub modifiers: Mapping,
    #[serde(default)]
    pub parameters: Mapping,
    pub steps: Vec<WorkflowStepFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterFile {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStepFile {
    pub tool: String,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

// ============================================================================
// Parser
// ============================================================================

/// Workflow parser (Infrastructure service)
pub struct WorkflowParser;

impl WorkflowParser {
    /// Parse a workflow definition from a YAML or JSON file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<WorkflowDefinition, WorkflowParseError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| WorkflowParseError::IoError {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML (or JSON) string
    pub fn parse_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowParseError> {
        let file: WorkflowFile =
            serde_yaml::from_str(yaml).map_err(|e| WorkflowParseError::YamlError(e.to_string()))?;

        Self::validate_and_convert(file)
    }

    /// Convert the file representation and enforce domain invariants
    fn validate_and_convert(file: WorkflowFile) -> Result<WorkflowDefinition, WorkflowParseError> {
        let mut definition =
            WorkflowDefinition::new(file.name).with_keywords(file.trigger_keywords);

        definition.modifiers = Self::convert_modifiers(&file.modifiers)?;
        definition.description = file.description;
        definition.version = file.version;
        definition.trigger_pattern = file.trigger_pattern;
        definition.sample_prompts = file.sample_prompts;
        definition.default_parameters = file.defaults;
        definition.parameters = Self::convert_parameters(&file.parameters)?;
        definition.steps = file.steps.into_iter().map(Self::convert_step).collect();

        definition
            .validate()
            .map_err(|e| WorkflowParseError::ValidationError(e.to_string()))?;

        Ok(definition)
    }

    fn convert_modifiers(modifiers: &Mapping) -> Result<Vec<Modifier>, WorkflowParseError> {
        modifiers
            .iter()
            .map(|(phrase, overrides)| {
                let phrase = Self::mapping_key(phrase, "modifiers")?;
                let overrides: BTreeMap<String, serde_json::Value> =
                    serde_yaml::from_value(overrides.clone()).map_err(|e| {
                        WorkflowParseError::YamlError(format!("modifier '{}': {}", phrase, e))
                    })?;
                Ok(Modifier { phrase, overrides })
            })
            .collect()
    }

    fn convert_parameters(
        parameters: &Mapping,
    ) -> Result<Vec<ParameterSchema>, WorkflowParseError> {
        parameters
            .iter()
            .map(|(name, spec)| {
                let name = Self::mapping_key(name, "parameters")?;
                let spec: ParameterFile = serde_yaml::from_value(spec.clone()).map_err(|e| {
                    WorkflowParseError::YamlError(format!("parameter '{}': {}", name, e))
                })?;
                Ok(ParameterSchema {
                    name,
                    param_type: spec.param_type,
                    computed: spec.computed,
                    depends_on: spec.depends_on,
                    default: spec.default,
                    description: spec.description,
                })
            })
            .collect()
    }

    fn convert_step(step: WorkflowStepFile) -> WorkflowStep {
        WorkflowStep {
            operation: step.tool,
            params: step.params,
            description: step.description,
            condition: step.condition,
            optional: step.optional,
            tags: step.tags.into_iter().collect::<BTreeSet<_>>(),
        }
    }

    fn mapping_key(key: &YamlValue, section: &str) -> Result<String, WorkflowParseError> {
        key.as_str().map(str::to_string).ok_or_else(|| {
            WorkflowParseError::ValidationError(format!("{} keys must be strings", section))
        })
    }

    /// Serialize a definition back to the file format
    pub fn to_yaml(definition: &WorkflowDefinition) -> Result<String, WorkflowParseError> {
        let file = Self::definition_to_file(definition)?;
        serde_yaml::to_string(&file).map_err(|e| WorkflowParseError::YamlError(e.to_string()))
    }

    fn definition_to_file(definition: &WorkflowDefinition) -> Result<WorkflowFile, WorkflowParseError> {
        let mut modifiers = Mapping::new();
        for modifier in &definition.modifiers {
            modifiers.insert(
                YamlValue::String(modifier.phrase.clone()),
                to_yaml_value(&modifier.overrides)?,
            );
        }

        let mut parameters = Mapping::new();
        for parameter in &definition.parameters {
            let spec = ParameterFile {
                param_type: parameter.param_type,
                computed: parameter.computed.clone(),
                depends_on: parameter.depends_on.clone(),
                default: parameter.default.clone(),
                description: parameter.description.clone(),
            };
            parameters.insert(YamlValue::String(parameter.name.clone()), to_yaml_value(&spec)?);
        }

        Ok(WorkflowFile {
            name: definition.name.clone(),
            description: definition.description.clone(),
            version: definition.version.clone(),
            trigger_keywords: definition.trigger_keywords.iter().cloned().collect(),
            trigger_pattern: definition.trigger_pattern.clone(),
            sample_prompts: definition.sample_prompts.clone(),
            defaults: definition.default_parameters.clone(),
            modifiers,
            parameters,
            steps: definition
                .steps
                .iter()
                .map(|step| WorkflowStepFile {
                    tool: step.operation.clone(),
                    params: step.params.clone(),
                    description: step.description.clone(),
                    condition: step.condition.clone(),
                    optional: step.optional,
                    tags: step.tags.iter().cloned().collect(),
                })
                .collect(),
        })
    }
}

fn to_yaml_value<T: Serialize>(value: &T) -> Result<YamlValue, WorkflowParseError> {
    serde_yaml::to_value(value).map_err(|e| WorkflowParseError::YamlError(e.to_string()))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkflowParseError {
    #[error("IO error reading {path}: {error}")]
    IoError { path: String, error: String },

    #[error("YAML parse error: {0}")]
    YamlError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
