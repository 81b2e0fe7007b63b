// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::debug;

use crate::domain::matching::ModifierResult;
use crate::domain::repository::WorkflowRepository;
use crate::domain::workflow::WorkflowDefinition;

/// Turns modifier phrases found in a goal into parameter overrides
///
/// The result starts from the workflow's default parameters. Every modifier
/// whose phrase occurs in the goal (case-insensitive) is merged in
/// declaration order, so a later modifier overwrites an earlier one on the
/// same parameter.
#[derive(Clone)]
pub struct ModifierExtractor {
    repository: Arc<dyn WorkflowRepository>,
}

impl ModifierExtractor {
    pub fn new(repository: Arc<dyn WorkflowRepository>) -> Self {
        Self { repository }
    }

    /// Unknown workflows yield an empty result
    pub fn extract(&self, goal: &str, workflow_name: &str) -> ModifierResult {
        match self.repository.get(workflow_name) {
            Some(definition) => Self::extract_from(&definition, goal),
            None => {
                debug!(workflow = %workflow_name, "No definition for modifier extraction");
                ModifierResult::default()
            }
        }
    }

    pub fn extract_from(definition: &WorkflowDefinition, goal: &str) -> ModifierResult {
        let goal = goal.to_lowercase();
        let mut result = ModifierResult {
            modifiers: definition.default_parameters.clone(),
            matched_keywords: Vec::new(),
        };

        for modifier in &definition.modifiers {
            let phrase = modifier.phrase.trim().to_lowercase();
            if phrase.is_empty() || !goal.contains(&phrase) {
                continue;
            }
            for (parameter, value) in &modifier.overrides {
                result.modifiers.insert(parameter.clone(), value.clone());
            }
            result.matched_keywords.push(modifier.phrase.clone());
        }

        if !result.matched_keywords.is_empty() {
            debug!(
                workflow = %definition.name,
                phrases = ?result.matched_keywords,
                "Applied goal modifiers"
            );
        }
        result
    }
}
