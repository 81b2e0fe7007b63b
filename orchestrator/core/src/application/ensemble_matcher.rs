// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ensemble Matcher Application Service
//!
//! Runs every configured matcher for a goal and hands the votes to the
//! [`EnsembleAggregator`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Matcher orchestration (strategy, timeouts, degradation)
//! - **Dependencies:** Domain (Matcher, EnsembleResult), Infrastructure (EventBus, MatchTelemetry)
//!
//! # Failure isolation
//!
//! A matcher that errors, panics or exceeds its timeout contributes a zero-confidence
//! entry tagged with the error; the other matchers are unaffected. The
//! aggregator always receives exactly one entry per matcher, in configured
//! order, so the decision is the same whether matchers ran one after another
//! or concurrently.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::application::ensemble_aggregator::EnsembleAggregator;
use crate::domain::events::{RoutingEvent, RoutingRequestId};
use crate::domain::matching::{
    EnsembleResult, ExecutionStrategy, MatchContext, Matcher, MatcherError, MatcherResult,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::telemetry::{MatchRecord, MatchTelemetry};

/// Full outcome of one ensemble run
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub request_id: RoutingRequestId,
    pub result: EnsembleResult,
    /// One entry per matcher, in configured order
    pub matcher_results: Vec<MatcherResult>,
    pub matcher_latencies: Vec<(String, Duration)>,
    /// Sum of matcher latencies when sequential, maximum when concurrent
    pub total_latency: Duration,
}

impl MatchReport {
    pub fn degraded_matchers(&self) -> Vec<String> {
        self.matcher_results
            .iter()
            .filter(|r| r.metadata.contains_key("error"))
            .map(|r| r.matcher_name.clone())
            .collect()
    }
}

pub struct EnsembleMatcher {
    matchers: Vec<Arc<dyn Matcher>>,
    aggregator: EnsembleAggregator,
    strategy: ExecutionStrategy,
    timeout: Duration,
    telemetry: Option<Arc<MatchTelemetry>>,
    event_bus: Option<EventBus>,
}

impl EnsembleMatcher {
    pub fn new(
        matchers: Vec<Arc<dyn Matcher>>,
        aggregator: EnsembleAggregator,
        strategy: ExecutionStrategy,
        timeout: Duration,
    ) -> Self {
        Self {
            matchers,
            aggregator,
            strategy,
            timeout,
            telemetry: None,
            event_bus: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<MatchTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn matcher_names(&self) -> Vec<&str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    pub async fn match_goal(&self, goal: &str, context: Option<&MatchContext>) -> EnsembleResult {
        self.match_with_report(goal, context).await.result
    }

    pub async fn match_with_report(
        &self,
        goal: &str,
        context: Option<&MatchContext>,
    ) -> MatchReport {
        let request_id = RoutingRequestId::new();

        let outcomes: Vec<(MatcherResult, Duration)> = match self.strategy {
            ExecutionStrategy::Sequential => {
                let mut outcomes = Vec::with_capacity(self.matchers.len());
                for matcher in &self.matchers {
                    outcomes.push(self.run_matcher(request_id, matcher, goal, context).await);
                }
                outcomes
            }
            ExecutionStrategy::Concurrent => {
                join_all(
                    self.matchers
                        .iter()
                        .map(|matcher| self.run_matcher(request_id, matcher, goal, context)),
                )
                .await
            }
        };

        let matcher_latencies: Vec<(String, Duration)> = outcomes
            .iter()
            .map(|(result, latency)| (result.matcher_name.clone(), *latency))
            .collect();
        let total_latency = match self.strategy {
            ExecutionStrategy::Sequential => matcher_latencies.iter().map(|(_, l)| *l).sum(),
            ExecutionStrategy::Concurrent => matcher_latencies
                .iter()
                .map(|(_, l)| *l)
                .max()
                .unwrap_or_default(),
        };
        let matcher_results: Vec<MatcherResult> =
            outcomes.into_iter().map(|(result, _)| result).collect();

        let result = self.aggregator.aggregate(&matcher_results, goal);

        let report = MatchReport {
            request_id,
            result,
            matcher_results,
            matcher_latencies,
            total_latency,
        };
        self.observe(goal, &report);
        report
    }

    async fn run_matcher(
        &self,
        request_id: RoutingRequestId,
        matcher: &Arc<dyn Matcher>,
        goal: &str,
        context: Option<&MatchContext>,
    ) -> (MatcherResult, Duration) {
        let started = Instant::now();
        let guarded = AssertUnwindSafe(matcher.match_goal(goal, context)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(MatcherError::Internal(format!(
                "matcher panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(MatcherError::Timeout {
                matcher: matcher.name().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        let latency = started.elapsed();

        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    request_id = %request_id,
                    matcher = %matcher.name(),
                    error = %error,
                    "Matcher degraded to zero confidence"
                );
                if let Some(bus) = &self.event_bus {
                    bus.publish(RoutingEvent::MatcherDegraded {
                        request_id,
                        matcher_name: matcher.name().to_string(),
                        reason: error.to_string(),
                        degraded_at: Utc::now(),
                    });
                }
                MatcherResult::no_match(matcher.name(), matcher.weight())
                    .with_metadata("error", json!(error.to_string()))
            }
        };
        (result, latency)
    }

    fn observe(&self, goal: &str, report: &MatchReport) {
        let result = &report.result;
        info!(
            request_id = %report.request_id,
            workflow = ?result.workflow_name,
            final_score = result.final_score,
            confidence = %result.confidence_level,
            composition_mode = result.composition_mode,
            latency_ms = report.total_latency.as_millis() as u64,
            "Goal matched"
        );

        if let Some(telemetry) = &self.telemetry {
            telemetry.record(MatchRecord {
                request_id: report.request_id,
                goal: goal.to_string(),
                workflow_name: result.workflow_name.clone(),
                confidence_level: result.confidence_level,
                final_score: result.final_score,
                strategy: self.strategy,
                matcher_latencies: report.matcher_latencies.clone(),
                total_latency: report.total_latency,
                degraded_matchers: report.degraded_matchers(),
                recorded_at: Utc::now(),
            });
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(RoutingEvent::GoalMatched {
                request_id: report.request_id,
                goal: goal.to_string(),
                workflow_name: result.workflow_name.clone(),
                final_score: result.final_score,
                confidence_level: result.confidence_level,
                composition_mode: result.composition_mode,
                latency_ms: report.total_latency.as_millis() as u64,
                matched_at: Utc::now(),
            });
        }
    }
}

fn panic_message<'a>(payload: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::modifier_extractor::ModifierExtractor;
    use crate::domain::matching::ConfidenceLevel;
    use crate::domain::repository::WorkflowCatalog;
    use crate::domain::router_config::EnsembleConfig;
    use async_trait::async_trait;

    struct FixedMatcher {
        name: &'static str,
        weight: f64,
        vote: Option<(&'static str, f64)>,
        delay: Duration,
    }

    #[async_trait]
    impl Matcher for FixedMatcher {
        fn name(&self) -> &str {
            self.name
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        async fn match_goal(
            &self,
            _goal: &str,
            _context: Option<&MatchContext>,
        ) -> Result<MatcherResult, MatcherError> {
            tokio::time::sleep(self.delay).await;
            Ok(match self.vote {
                Some((workflow, confidence)) => {
                    MatcherResult::matched(self.name, workflow, confidence, self.weight)
                }
                None => MatcherResult::no_match(self.name, self.weight),
            })
        }
    }

    struct BrokenMatcher;

    #[async_trait]
    impl Matcher for BrokenMatcher {
        fn name(&self) -> &str {
            "broken"
        }

        fn weight(&self) -> f64 {
            0.4
        }

        async fn match_goal(
            &self,
            _goal: &str,
            _context: Option<&MatchContext>,
        ) -> Result<MatcherResult, MatcherError> {
            Err(MatcherError::Internal("index corrupted".to_string()))
        }
    }

    struct PanickingMatcher;

    #[async_trait]
    impl Matcher for PanickingMatcher {
        fn name(&self) -> &str {
            "panicking"
        }

        fn weight(&self) -> f64 {
            0.4
        }

        async fn match_goal(
            &self,
            _goal: &str,
            _context: Option<&MatchContext>,
        ) -> Result<MatcherResult, MatcherError> {
            let hits: Vec<f64> = Vec::new();
            Ok(MatcherResult::matched("panicking", "chair_workflow", hits[0], 0.4))
        }
    }

    fn ensemble(matchers: Vec<Arc<dyn Matcher>>, strategy: ExecutionStrategy) -> EnsembleMatcher {
        let extractor = ModifierExtractor::new(Arc::new(Arc::new(WorkflowCatalog::new())));
        EnsembleMatcher::new(
            matchers,
            EnsembleAggregator::new(EnsembleConfig::default(), extractor),
            strategy,
            Duration::from_millis(200),
        )
    }

    fn fixed(name: &'static str, vote: Option<(&'static str, f64)>, delay_ms: u64) -> Arc<dyn Matcher> {
        Arc::new(FixedMatcher {
            name,
            weight: 0.4,
            vote,
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_failed_matcher_degrades_to_zero() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let telemetry = Arc::new(MatchTelemetry::new(8));

        let matcher = ensemble(
            vec![fixed("keyword", Some(("table_workflow", 1.0)), 0), Arc::new(BrokenMatcher)],
            ExecutionStrategy::Sequential,
        )
        .with_event_bus(bus)
        .with_telemetry(telemetry.clone());

        let report = matcher.match_with_report("table", None).await;
        assert_eq!(report.result.workflow_name.as_deref(), Some("table_workflow"));
        assert_eq!(report.matcher_results.len(), 2);
        assert_eq!(report.degraded_matchers(), vec!["broken".to_string()]);

        assert!(matches!(
            events.recv().await.unwrap(),
            RoutingEvent::MatcherDegraded { ref matcher_name, .. } if matcher_name == "broken"
        ));
        assert!(matches!(events.recv().await.unwrap(), RoutingEvent::GoalMatched { .. }));
        assert_eq!(telemetry.records()[0].degraded_matchers, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_panicking_matcher_is_isolated() {
        for strategy in [ExecutionStrategy::Sequential, ExecutionStrategy::Concurrent] {
            let bus = EventBus::new(16);
            let mut events = bus.subscribe();
            let matcher = ensemble(
                vec![
                    fixed("keyword", Some(("table_workflow", 1.0)), 0),
                    Arc::new(PanickingMatcher),
                ],
                strategy,
            )
            .with_event_bus(bus);

            let report = matcher.match_with_report("table", None).await;
            assert_eq!(report.result.workflow_name.as_deref(), Some("table_workflow"));
            assert_eq!(report.matcher_results.len(), 2);
            assert_eq!(report.degraded_matchers(), vec!["panicking".to_string()]);

            let panicked = &report.matcher_results[1];
            assert_eq!(panicked.confidence, 0.0);
            assert!(panicked.metadata["error"]
                .as_str()
                .unwrap()
                .contains("panicked"));
            assert!(matches!(
                events.recv().await.unwrap(),
                RoutingEvent::MatcherDegraded { ref matcher_name, .. } if matcher_name == "panicking"
            ));
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(literal.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(panic_message(owned.as_ref()), "index out of bounds");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_timeout_degrades_slow_matcher() {
        let matcher = ensemble(
            vec![
                fixed("keyword", Some(("table_workflow", 1.0)), 0),
                fixed("semantic", Some(("chair_workflow", 1.0)), 1_000),
            ],
            ExecutionStrategy::Concurrent,
        );

        let report = matcher.match_with_report("table", None).await;
        assert_eq!(report.result.workflow_name.as_deref(), Some("table_workflow"));
        let slow = &report.matcher_results[1];
        assert!(!slow.is_match());
        assert!(slow.metadata.contains_key("error"));
    }

    #[tokio::test]
    async fn test_latency_accounting_per_strategy() {
        let matchers = || {
            vec![
                fixed("keyword", Some(("table_workflow", 1.0)), 30),
                fixed("semantic", None, 30),
            ]
        };

        let sequential = ensemble(matchers(), ExecutionStrategy::Sequential)
            .match_with_report("table", None)
            .await;
        let summed: Duration = sequential.matcher_latencies.iter().map(|(_, l)| *l).sum();
        assert_eq!(sequential.total_latency, summed);

        let concurrent = ensemble(matchers(), ExecutionStrategy::Concurrent)
            .match_with_report("table", None)
            .await;
        let longest = concurrent
            .matcher_latencies
            .iter()
            .map(|(_, l)| *l)
            .max()
            .unwrap();
        assert_eq!(concurrent.total_latency, longest);
        assert_eq!(
            concurrent
                .matcher_results
                .iter()
                .map(|r| r.matcher_name.as_str())
                .collect::<Vec<_>>(),
            vec!["keyword", "semantic"]
        );
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let matcher = ensemble(vec![fixed("keyword", None, 0)], ExecutionStrategy::Sequential);
        let result = matcher.match_goal("lamp", None).await;
        assert_eq!(result.confidence_level, ConfidenceLevel::None);
        assert!(result.workflow_name.is_none());
    }
}
