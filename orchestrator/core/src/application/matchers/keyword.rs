// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::domain::matching::{MatchContext, Matcher, MatcherError, MatcherResult};
use crate::domain::repository::WorkflowRepository;

/// Case-insensitive substring match against trigger keywords
///
/// When several workflows match, the longest keyword wins. Equal lengths
/// keep the first workflow in name order.
pub struct KeywordMatcher {
    repository: Arc<dyn WorkflowRepository>,
    weight: f64,
}

impl KeywordMatcher {
    pub const NAME: &'static str = "keyword";

    pub fn new(repository: Arc<dyn WorkflowRepository>, weight: f64) -> Self {
        Self { repository, weight }
    }
}

#[async_trait]
impl Matcher for KeywordMatcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn match_goal(
        &self,
        goal: &str,
        _context: Option<&MatchContext>,
    ) -> Result<MatcherResult, MatcherError> {
        let goal = goal.to_lowercase();
        let catalog = self.repository.snapshot();

        let mut best: Option<(String, String)> = None;
        for definition in catalog.iter() {
            for keyword in &definition.trigger_keywords {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() || !goal.contains(&keyword) {
                    continue;
                }
                let longer = best
                    .as_ref()
                    .map_or(true, |(_, current)| keyword.chars().count() > current.chars().count());
                if longer {
                    best = Some((definition.name.clone(), keyword));
                }
            }
        }

        match best {
            Some((workflow, keyword)) => {
                debug!(workflow = %workflow, keyword = %keyword, "Keyword match");
                Ok(MatcherResult::matched(Self::NAME, workflow, 1.0, self.weight)
                    .with_metadata("matched_keyword", json!(keyword)))
            }
            None => Ok(MatcherResult::no_match(Self::NAME, self.weight)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::WorkflowCatalog;
    use crate::domain::workflow::{WorkflowDefinition, WorkflowStep};

    fn matcher() -> KeywordMatcher {
        let catalog: WorkflowCatalog = [
            WorkflowDefinition::new("table_workflow").with_keywords(["table"]),
            WorkflowDefinition::new("coffee_table_workflow").with_keywords(["coffee table"]),
            WorkflowDefinition::new("desk_workflow").with_keywords(["desk", "table"]),
        ]
        .into_iter()
        .map(|d| d.with_step(WorkflowStep::new("mesh_create_primitive")))
        .collect();
        KeywordMatcher::new(Arc::new(Arc::new(catalog)), 0.4)
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let result = matcher().match_goal("Build a DESK", None).await.unwrap();
        assert_eq!(result.workflow_name.as_deref(), Some("desk_workflow"));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.metadata.get("matched_keyword"), Some(&json!("desk")));
    }

    #[tokio::test]
    async fn test_longest_keyword_wins() {
        let result = matcher().match_goal("a low coffee table", None).await.unwrap();
        assert_eq!(result.workflow_name.as_deref(), Some("coffee_table_workflow"));
    }

    #[tokio::test]
    async fn test_equal_length_ties_go_to_name_order() {
        let result = matcher().match_goal("simple table", None).await.unwrap();
        assert_eq!(result.workflow_name.as_deref(), Some("desk_workflow"));
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let result = matcher().match_goal("a lamp", None).await.unwrap();
        assert!(!result.is_match());
        assert_eq!(result.weight, 0.4);
    }
}
