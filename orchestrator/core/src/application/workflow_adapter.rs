// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Adapter
//!
//! Trims a workflow's optional steps according to how confident the
//! ensemble was:
//!
//! | Level       | Kept steps                                                   |
//! |-------------|--------------------------------------------------------------|
//! | HIGH        | all                                                          |
//! | MEDIUM      | core, plus optional steps matched by tag or by description   |
//! | LOW / NONE  | core only                                                    |
//!
//! At MEDIUM a tag found in the goal keeps the step outright; only untagged
//! (or unmatched) steps fall back to embedding similarity between the goal
//! and the step description.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use scenecraft_cortex::{cosine_similarity, EmbeddingProvider};

use crate::domain::matching::ConfidenceLevel;
use crate::domain::workflow::{WorkflowDefinition, WorkflowStep};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StepDecisionReason {
    Core,
    HighConfidence,
    TagMatch { tag: String },
    SemanticMatch { similarity: f64 },
    SkippedLowConfidence,
    SkippedNoMatch,
    SkippedEmbeddingFailure { error: String },
}

impl StepDecisionReason {
    pub fn is_kept(&self) -> bool {
        matches!(
            self,
            StepDecisionReason::Core
                | StepDecisionReason::HighConfidence
                | StepDecisionReason::TagMatch { .. }
                | StepDecisionReason::SemanticMatch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDecision {
    /// Position in the original step list
    pub index: usize,
    pub operation: String,
    pub label: String,
    pub reason: StepDecisionReason,
}

/// Report of which steps survived adaptation and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationResult {
    pub workflow_name: String,
    pub confidence_level: ConfidenceLevel,
    pub original_step_count: usize,
    pub kept: Vec<StepDecision>,
    pub skipped: Vec<StepDecision>,
}

impl AdaptationResult {
    pub fn kept_count(&self) -> usize {
        self.kept.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

pub struct WorkflowAdapter {
    embedder: Arc<dyn EmbeddingProvider>,
    semantic_threshold: f64,
}

impl WorkflowAdapter {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, semantic_threshold: f64) -> Self {
        Self {
            embedder,
            semantic_threshold,
        }
    }

    pub async fn adapt(
        &self,
        definition: &WorkflowDefinition,
        level: ConfidenceLevel,
        goal: &str,
    ) -> (Vec<WorkflowStep>, AdaptationResult) {
        let goal_lower = goal.to_lowercase();
        // Embedded at most once, and only if some step needs the fallback
        let mut goal_vector: Option<Result<Vec<f32>, String>> = None;

        let mut steps = Vec::new();
        let mut kept = Vec::new();
        let mut skipped = Vec::new();

        for (index, step) in definition.steps.iter().enumerate() {
            let reason = if !step.optional {
                StepDecisionReason::Core
            } else {
                match level {
                    ConfidenceLevel::High => StepDecisionReason::HighConfidence,
                    ConfidenceLevel::Low | ConfidenceLevel::None => {
                        StepDecisionReason::SkippedLowConfidence
                    }
                    ConfidenceLevel::Medium => {
                        self.decide_medium(step, goal, &goal_lower, &mut goal_vector)
                            .await
                    }
                }
            };

            let decision = StepDecision {
                index,
                operation: step.operation.clone(),
                label: step.label().to_string(),
                reason,
            };
            if decision.reason.is_kept() {
                steps.push(step.clone());
                kept.push(decision);
            } else {
                skipped.push(decision);
            }
        }

        debug!(
            workflow = %definition.name,
            confidence = %level,
            kept = kept.len(),
            skipped = skipped.len(),
            "Adapted workflow"
        );

        let result = AdaptationResult {
            workflow_name: definition.name.clone(),
            confidence_level: level,
            original_step_count: definition.steps.len(),
            kept,
            skipped,
        };
        (steps, result)
    }

    async fn decide_medium(
        &self,
        step: &WorkflowStep,
        goal: &str,
        goal_lower: &str,
        goal_vector: &mut Option<Result<Vec<f32>, String>>,
    ) -> StepDecisionReason {
        if let Some(tag) = step
            .tags
            .iter()
            .find(|tag| !tag.is_empty() && goal_lower.contains(&tag.to_lowercase()))
        {
            return StepDecisionReason::TagMatch { tag: tag.clone() };
        }

        let Some(description) = step.description.as_deref() else {
            return StepDecisionReason::SkippedNoMatch;
        };

        if goal_vector.is_none() {
            *goal_vector = Some(self.embedder.embed(goal).await.map_err(|e| e.to_string()));
        }
        let goal_vector = match goal_vector.as_ref() {
            Some(Ok(vector)) => vector,
            Some(Err(error)) => {
                warn!(step = %step.label(), error = %error, "Goal embedding failed, skipping optional step");
                return StepDecisionReason::SkippedEmbeddingFailure {
                    error: error.clone(),
                };
            }
            None => return StepDecisionReason::SkippedNoMatch,
        };

        let step_vector = match self.embedder.embed(description).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(step = %step.label(), error = %e, "Step embedding failed, skipping optional step");
                return StepDecisionReason::SkippedEmbeddingFailure {
                    error: e.to_string(),
                };
            }
        };

        let similarity = cosine_similarity(goal_vector, &step_vector);
        if similarity >= self.semantic_threshold {
            StepDecisionReason::SemanticMatch { similarity }
        } else {
            StepDecisionReason::SkippedNoMatch
        }
    }
}
