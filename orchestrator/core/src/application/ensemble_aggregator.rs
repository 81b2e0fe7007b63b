// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ensemble Aggregator
//!
//! Combines per-matcher votes into one routing decision.
//!
//! # Scoring
//!
//! ```text
//! score(w)       = Σ confidence × weight        over matchers voting for w
//!                  × pattern_boost              if the pattern matcher voted for w
//! max_possible   = Σ weight                     over matchers voting for the winner
//!                  × pattern_boost              if the pattern matcher is among them
//! final_score    = min(1, score(winner) / max_possible)
//! ```
//!
//! Normalizing against the contributing matchers only means a strong
//! single-signal match (e.g. semantic similarity 0.84) keeps its 0.84 score
//! instead of being diluted by matchers that abstained.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::application::matchers::PatternMatcher;
use crate::application::modifier_extractor::ModifierExtractor;
use crate::domain::matching::{ConfidenceLevel, EnsembleResult, MatcherResult};
use crate::domain::router_config::EnsembleConfig;

#[derive(Debug, Default)]
struct Tally {
    score: f64,
    contributing_weight: f64,
    contributions: BTreeMap<String, f64>,
    pattern_backed: bool,
}

#[derive(Clone)]
pub struct EnsembleAggregator {
    settings: EnsembleConfig,
    extractor: ModifierExtractor,
}

impl EnsembleAggregator {
    pub fn new(settings: EnsembleConfig, extractor: ModifierExtractor) -> Self {
        Self {
            settings,
            extractor,
        }
    }

    pub fn settings(&self) -> &EnsembleConfig {
        &self.settings
    }

    pub fn aggregate(&self, results: &[MatcherResult], goal: &str) -> EnsembleResult {
        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

        for result in results {
            let Some(workflow) = result.workflow_name.as_deref() else {
                continue;
            };
            let weighted = result.weighted_score();
            if !(weighted > 0.0) {
                continue;
            }

            let tally = tallies.entry(workflow).or_default();
            tally.score += weighted;
            tally.contributing_weight += result.weight;
            *tally
                .contributions
                .entry(result.matcher_name.clone())
                .or_insert(0.0) += weighted;
            if result.matcher_name == PatternMatcher::NAME && result.confidence > 0.0 {
                tally.pattern_backed = true;
            }
        }

        for tally in tallies.values_mut() {
            if tally.pattern_backed {
                tally.score *= self.settings.pattern_boost;
            }
        }

        let mut ranked: Vec<(&str, &Tally)> = tallies
            .iter()
            .filter(|(_, tally)| tally.score > 0.0)
            .map(|(name, tally)| (*name, tally))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let Some(&(winner, tally)) = ranked.first() else {
            debug!("No matcher produced a positive score");
            return EnsembleResult::none();
        };

        let mut composition_mode = false;
        let mut extra_workflows = Vec::new();
        if let Some(&(runner_up, runner_tally)) = ranked.get(1) {
            if tally.score - runner_tally.score < self.settings.composition_threshold {
                composition_mode = true;
                extra_workflows.push(runner_up.to_string());
            }
        }

        let boost = if tally.pattern_backed {
            self.settings.pattern_boost
        } else {
            1.0
        };
        let max_possible = tally.contributing_weight * boost;
        let final_score = if max_possible > 0.0 {
            (tally.score / max_possible).min(1.0)
        } else {
            0.0
        };

        let confidence_level = if self.wants_simple(goal) {
            ConfidenceLevel::Low
        } else {
            self.level_for(final_score)
        };

        let modifiers = self.extractor.extract(goal, winner);

        debug!(
            workflow = %winner,
            raw_score = tally.score,
            final_score,
            confidence = %confidence_level,
            composition_mode,
            "Ensemble decision"
        );

        EnsembleResult {
            workflow_name: Some(winner.to_string()),
            final_score,
            confidence_level,
            modifiers: modifiers.modifiers,
            modifier_keywords: modifiers.matched_keywords,
            matcher_contributions: tally.contributions.clone(),
            requires_adaptation: confidence_level != ConfidenceLevel::High,
            composition_mode,
            extra_workflows,
        }
    }

    fn level_for(&self, score: f64) -> ConfidenceLevel {
        if score >= self.settings.high_threshold {
            ConfidenceLevel::High
        } else if score >= self.settings.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// The user explicitly asked for a minimal result
    fn wants_simple(&self, goal: &str) -> bool {
        let goal = goal.to_lowercase();
        self.settings
            .wants_simple_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && goal.contains(&keyword.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::WorkflowCatalog;
    use crate::domain::workflow::{Modifier, WorkflowDefinition, WorkflowStep};
    use serde_json::json;
    use std::sync::Arc;

    fn aggregator() -> EnsembleAggregator {
        let catalog: WorkflowCatalog = ["chair_workflow", "table_workflow"]
            .into_iter()
            .map(|name| {
                WorkflowDefinition::new(name)
                    .with_default("leg_angle", json!(0))
                    .with_modifier(Modifier::new("angled legs").with("leg_angle", json!(15)))
                    .with_step(WorkflowStep::new("mesh_create_primitive"))
            })
            .collect();
        EnsembleAggregator::new(
            EnsembleConfig::default(),
            ModifierExtractor::new(Arc::new(Arc::new(catalog))),
        )
    }

    fn keyword(workflow: &str) -> MatcherResult {
        MatcherResult::matched("keyword", workflow, 1.0, 0.40)
    }

    fn semantic(workflow: &str, similarity: f64) -> MatcherResult {
        MatcherResult::matched("semantic", workflow, similarity, 0.40)
    }

    fn pattern(workflow: &str) -> MatcherResult {
        MatcherResult::matched("pattern", workflow, 0.95, 0.15)
    }

    #[test]
    fn test_semantic_only_is_not_diluted() {
        let results = vec![
            MatcherResult::no_match("keyword", 0.40),
            semantic("table_workflow", 0.84),
            MatcherResult::no_match("pattern", 0.15),
        ];
        let decision = aggregator().aggregate(&results, "a place to eat dinner");

        assert_eq!(decision.workflow_name.as_deref(), Some("table_workflow"));
        assert!((decision.final_score - 0.84).abs() < 1e-9);
        assert_eq!(decision.confidence_level, ConfidenceLevel::High);
        assert!(!decision.requires_adaptation);
    }

    #[test]
    fn test_pattern_boost_is_normalized_away() {
        let results = vec![pattern("table_workflow")];
        let decision = aggregator().aggregate(&results, "anything");
        assert!((decision.final_score - 0.95).abs() < 1e-9);
        assert_eq!(decision.matcher_contributions.len(), 1);
    }

    #[test]
    fn test_combined_signals() {
        let results = vec![keyword("table_workflow"), semantic("table_workflow", 0.5)];
        let decision = aggregator().aggregate(&results, "table");
        // (0.40 + 0.20) / 0.80
        assert!((decision.final_score - 0.75).abs() < 1e-9);
        assert_eq!(decision.confidence_level, ConfidenceLevel::High);
        assert!(!decision.composition_mode);
    }

    #[test]
    fn test_close_runner_up_enables_composition() {
        let results = vec![keyword("table_workflow"), semantic("chair_workflow", 0.8)];
        let decision = aggregator().aggregate(&results, "table to sit at");
        assert_eq!(decision.workflow_name.as_deref(), Some("table_workflow"));
        assert!(decision.composition_mode);
        assert_eq!(decision.extra_workflows, vec!["chair_workflow".to_string()]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let tied = vec![
            MatcherResult::matched("keyword", "table_workflow", 1.0, 0.40),
            MatcherResult::matched("semantic", "chair_workflow", 1.0, 0.40),
        ];
        assert_eq!(
            aggregator().aggregate(&tied, "x").workflow_name.as_deref(),
            Some("chair_workflow")
        );
    }

    #[test]
    fn test_medium_and_low_bands() {
        let medium = aggregator().aggregate(&[semantic("table_workflow", 0.6)], "x");
        assert_eq!(medium.confidence_level, ConfidenceLevel::Medium);
        assert!(medium.requires_adaptation);

        let low = aggregator().aggregate(&[semantic("table_workflow", 0.45)], "x");
        assert_eq!(low.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_wants_simple_forces_low() {
        let decision = aggregator().aggregate(&[keyword("table_workflow")], "Prosty stół, table");
        assert_eq!(decision.final_score, 1.0);
        assert_eq!(decision.confidence_level, ConfidenceLevel::Low);
        assert!(decision.requires_adaptation);
    }

    #[test]
    fn test_no_positive_scores() {
        let results = vec![
            MatcherResult::no_match("keyword", 0.40),
            MatcherResult::matched("semantic", "table_workflow", 0.0, 0.40),
        ];
        let decision = aggregator().aggregate(&results, "a lamp");
        assert_eq!(decision, EnsembleResult::none());
        assert!(!decision.is_match());
    }

    #[test]
    fn test_modifiers_always_extracted_for_winner() {
        let decision =
            aggregator().aggregate(&[pattern("chair_workflow")], "chair with angled legs");
        assert_eq!(decision.modifiers.get("leg_angle"), Some(&json!(15)));
        assert_eq!(decision.modifier_keywords, vec!["angled legs".to_string()]);
    }
}
