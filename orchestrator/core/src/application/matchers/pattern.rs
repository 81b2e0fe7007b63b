// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::domain::matching::{MatchContext, Matcher, MatcherError, MatcherResult};
use crate::domain::repository::WorkflowRepository;

/// Maps an upstream-detected geometry pattern to the workflow declaring it
pub struct PatternMatcher {
    repository: Arc<dyn WorkflowRepository>,
    weight: f64,
    confidence: f64,
}

impl PatternMatcher {
    pub const NAME: &'static str = "pattern";

    pub fn new(repository: Arc<dyn WorkflowRepository>, weight: f64, confidence: f64) -> Self {
        Self {
            repository,
            weight,
            confidence,
        }
    }
}

#[async_trait]
impl Matcher for PatternMatcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn match_goal(
        &self,
        _goal: &str,
        context: Option<&MatchContext>,
    ) -> Result<MatcherResult, MatcherError> {
        let Some(pattern) = context.and_then(|c| c.detected_pattern.as_deref()) else {
            return Ok(MatcherResult::no_match(Self::NAME, self.weight));
        };

        let catalog = self.repository.snapshot();
        let workflow = catalog.iter().find(|definition| {
            definition
                .trigger_pattern
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(pattern))
        });

        Ok(match workflow {
            Some(definition) => {
                MatcherResult::matched(Self::NAME, definition.name.clone(), self.confidence, self.weight)
                    .with_metadata("detected_pattern", json!(pattern))
            }
            None => MatcherResult::no_match(Self::NAME, self.weight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::WorkflowCatalog;
    use crate::domain::workflow::{WorkflowDefinition, WorkflowStep};

    fn matcher() -> PatternMatcher {
        let catalog: WorkflowCatalog = std::iter::once(
            WorkflowDefinition::new("tower_workflow")
                .with_pattern("tower_like")
                .with_step(WorkflowStep::new("mesh_create_primitive")),
        )
        .collect();
        PatternMatcher::new(Arc::new(Arc::new(catalog)), 0.15, 0.95)
    }

    #[tokio::test]
    async fn test_detected_pattern_maps_to_workflow() {
        let context = MatchContext::with_pattern("tower_like");
        let result = matcher().match_goal("anything", Some(&context)).await.unwrap();
        assert_eq!(result.workflow_name.as_deref(), Some("tower_workflow"));
        assert_eq!(result.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_without_pattern_is_no_match() {
        let matcher = matcher();
        assert!(!matcher.match_goal("tower", None).await.unwrap().is_match());

        let context = MatchContext::with_pattern("phone_like");
        assert!(!matcher.match_goal("tower", Some(&context)).await.unwrap().is_match());
    }
}
