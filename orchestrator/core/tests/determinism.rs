// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The ensemble decision must not depend on whether matchers run one after
//! another or all at once, nor on which of them finishes first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::json;

use scenecraft_core::application::{EnsembleAggregator, EnsembleMatcher, ModifierExtractor};
use scenecraft_core::domain::matching::{
    ExecutionStrategy, MatchContext, Matcher, MatcherError, MatcherResult,
};
use scenecraft_core::domain::repository::{WorkflowCatalog, WorkflowRepository};
use scenecraft_core::domain::router_config::EnsembleConfig;
use scenecraft_core::domain::workflow::{Modifier, WorkflowDefinition, WorkflowStep};

const WORKFLOWS: [&str; 3] = ["alpha_workflow", "beta_workflow", "gamma_workflow"];

#[derive(Debug, Clone)]
struct Behaviour {
    weight: f64,
    vote: Option<(usize, f64)>,
    delay_ms: u64,
    fails: bool,
}

struct ScriptedMatcher {
    name: String,
    behaviour: Behaviour,
}

#[async_trait]
impl Matcher for ScriptedMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.behaviour.weight
    }

    async fn match_goal(
        &self,
        _goal: &str,
        _context: Option<&MatchContext>,
    ) -> Result<MatcherResult, MatcherError> {
        tokio::time::sleep(Duration::from_millis(self.behaviour.delay_ms)).await;
        if self.behaviour.fails {
            return Err(MatcherError::Internal("scripted failure".to_string()));
        }
        Ok(match self.behaviour.vote {
            Some((index, confidence)) => MatcherResult::matched(
                self.name.as_str(),
                WORKFLOWS[index],
                confidence,
                self.behaviour.weight,
            ),
            None => MatcherResult::no_match(self.name.as_str(), self.behaviour.weight),
        })
    }
}

fn repository() -> Arc<dyn WorkflowRepository> {
    let catalog: WorkflowCatalog = WORKFLOWS
        .iter()
        .map(|name| {
            WorkflowDefinition::new(*name)
                .with_step(WorkflowStep::new("mesh_create_primitive"))
                .with_default("size", json!(1.0))
                .with_modifier(Modifier::new("large").with("size", json!(3.0)))
        })
        .collect();
    Arc::new(Arc::new(catalog))
}

fn ensemble(behaviours: &[Behaviour], strategy: ExecutionStrategy) -> EnsembleMatcher {
    let matchers: Vec<Arc<dyn Matcher>> = behaviours
        .iter()
        .enumerate()
        .map(|(i, behaviour)| {
            Arc::new(ScriptedMatcher {
                name: format!("matcher_{i}"),
                behaviour: behaviour.clone(),
            }) as Arc<dyn Matcher>
        })
        .collect();
    let aggregator =
        EnsembleAggregator::new(EnsembleConfig::default(), ModifierExtractor::new(repository()));
    EnsembleMatcher::new(matchers, aggregator, strategy, Duration::from_secs(5))
}

fn behaviour() -> impl Strategy<Value = Behaviour> {
    (
        0.05f64..1.0,
        proptest::option::of((0usize..WORKFLOWS.len(), 0.0f64..=1.0)),
        0u64..4,
        proptest::bool::weighted(0.2),
    )
        .prop_map(|(weight, vote, delay_ms, fails)| Behaviour {
            weight,
            vote,
            delay_ms,
            fails,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sequential_and_concurrent_runs_agree(
        behaviours in proptest::collection::vec(behaviour(), 1..6),
        large in any::<bool>(),
    ) {
        let goal = if large { "a large piece" } else { "a piece" };
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let (sequential, concurrent) = runtime.block_on(async {
            let sequential = ensemble(&behaviours, ExecutionStrategy::Sequential)
                .match_goal(goal, None)
                .await;
            let concurrent = ensemble(&behaviours, ExecutionStrategy::Concurrent)
                .match_goal(goal, None)
                .await;
            (sequential, concurrent)
        });

        prop_assert_eq!(&sequential, &concurrent);
        prop_assert!((0.0..=1.0).contains(&sequential.final_score));
        if sequential.is_match() {
            let expected = if large { 3.0 } else { 1.0 };
            prop_assert_eq!(sequential.modifiers.get("size"), Some(&json!(expected)));
        }
    }
}
