// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Match telemetry: goal, decision, per-matcher latency, degraded matchers.
//!
//! Records go into a bounded ring buffer. Writers use `try_lock`, so a
//! reader holding the buffer never delays matching; a record that loses the
//! race is counted as dropped instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::events::RoutingRequestId;
use crate::domain::matching::{ConfidenceLevel, ExecutionStrategy};

/// One routed goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub request_id: RoutingRequestId,
    pub goal: String,
    pub workflow_name: Option<String>,
    pub confidence_level: ConfidenceLevel,
    pub final_score: f64,
    pub strategy: ExecutionStrategy,
    /// Matcher name and latency, in configured matcher order
    pub matcher_latencies: Vec<(String, Duration)>,
    pub total_latency: Duration,
    /// Matchers that failed or timed out on this request
    pub degraded_matchers: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MatchTelemetry {
    records: Mutex<VecDeque<MatchRecord>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl MatchTelemetry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Record a match without blocking; returns `false` if the record was dropped
    pub fn record(&self, record: MatchRecord) -> bool {
        tracing::debug!(
            event = "goal_matched",
            request_id = %record.request_id,
            workflow = ?record.workflow_name,
            confidence = %record.confidence_level,
            final_score = record.final_score,
            strategy = %record.strategy,
            latency_ms = record.total_latency.as_millis() as u64,
            degraded = record.degraded_matchers.len(),
            "match recorded"
        );

        metrics::counter!(
            "scenecraft_goals_routed_total",
            "confidence" => record.confidence_level.as_str()
        )
        .increment(1);
        metrics::histogram!("scenecraft_match_latency_seconds")
            .record(record.total_latency.as_secs_f64());
        for (matcher, latency) in &record.matcher_latencies {
            metrics::histogram!("scenecraft_matcher_latency_seconds", "matcher" => matcher.clone())
                .record(latency.as_secs_f64());
        }
        for matcher in &record.degraded_matchers {
            metrics::counter!("scenecraft_matcher_degraded_total", "matcher" => matcher.clone())
                .increment(1);
        }

        let Some(mut records) = self.records.try_lock() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("scenecraft_telemetry_dropped_total").increment(1);
            return false;
        };
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        true
    }

    /// Snapshot of the buffered records, oldest first
    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn avg_latency(&self) -> Duration {
        let records = self.records.lock();
        if records.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = records.iter().map(|r| r.total_latency).sum();
        total / records.len() as u32
    }

    /// Share of buffered requests that had at least one degraded matcher
    pub fn degraded_ratio(&self) -> f64 {
        let records = self.records.lock();
        if records.is_empty() {
            return 0.0;
        }
        let degraded = records
            .iter()
            .filter(|r| !r.degraded_matchers.is_empty())
            .count();
        degraded as f64 / records.len() as f64
    }
}

impl Default for MatchTelemetry {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(goal: &str, latency_ms: u64, degraded: &[&str]) -> MatchRecord {
        MatchRecord {
            request_id: RoutingRequestId::new(),
            goal: goal.to_string(),
            workflow_name: Some("table_workflow".to_string()),
            confidence_level: ConfidenceLevel::High,
            final_score: 0.9,
            strategy: ExecutionStrategy::Sequential,
            matcher_latencies: vec![("keyword".to_string(), Duration::from_millis(latency_ms))],
            total_latency: Duration::from_millis(latency_ms),
            degraded_matchers: degraded.iter().map(|s| s.to_string()).collect(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let telemetry = MatchTelemetry::new(2);
        assert!(telemetry.record(record("a", 10, &[])));
        assert!(telemetry.record(record("b", 20, &[])));
        assert!(telemetry.record(record("c", 30, &[])));

        let goals: Vec<String> = telemetry.records().into_iter().map(|r| r.goal).collect();
        assert_eq!(goals, vec!["b", "c"]);
        assert_eq!(telemetry.avg_latency(), Duration::from_millis(25));
    }

    #[test]
    fn test_contended_record_is_dropped() {
        let telemetry = MatchTelemetry::new(4);
        let guard = telemetry.records.lock();
        assert!(!telemetry.record(record("a", 10, &[])));
        drop(guard);

        assert_eq!(telemetry.dropped(), 1);
        assert!(telemetry.is_empty());
    }

    #[test]
    fn test_degraded_ratio() {
        let telemetry = MatchTelemetry::default();
        assert_eq!(telemetry.degraded_ratio(), 0.0);
        telemetry.record(record("a", 10, &["semantic"]));
        telemetry.record(record("b", 10, &[]));
        assert_eq!(telemetry.degraded_ratio(), 0.5);
    }
}
