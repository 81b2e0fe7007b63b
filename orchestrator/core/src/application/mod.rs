// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod ensemble_aggregator;
pub mod ensemble_matcher;
pub mod matchers;
pub mod modifier_extractor;
pub mod step_expander;
pub mod workflow_adapter;
pub mod workflow_router;

// Re-export services for convenience
pub use ensemble_aggregator::EnsembleAggregator;
pub use ensemble_matcher::{EnsembleMatcher, MatchReport};
pub use matchers::{KeywordMatcher, PatternMatcher, SemanticMatcher};
pub use modifier_extractor::ModifierExtractor;
pub use step_expander::{ExpansionError, ExpansionResult, PlannedCall, StepExpander};
pub use workflow_adapter::{AdaptationResult, StepDecision, StepDecisionReason, WorkflowAdapter};
pub use workflow_router::{RoutedPlan, RouterError, WorkflowRouter};
