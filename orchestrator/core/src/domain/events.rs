// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::matching::ConfidenceLevel;

/// Correlates every event emitted while routing one goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingRequestId(pub Uuid);

impl RoutingRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoutingRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoutingRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutingEvent {
    GoalMatched {
        request_id: RoutingRequestId,
        goal: String,
        workflow_name: Option<String>,
        final_score: f64,
        confidence_level: ConfidenceLevel,
        composition_mode: bool,
        latency_ms: u64,
        matched_at: DateTime<Utc>,
    },
    MatcherDegraded {
        request_id: RoutingRequestId,
        matcher_name: String,
        reason: String,
        degraded_at: DateTime<Utc>,
    },
    WorkflowsReloaded {
        loaded: usize,
        failed: usize,
        reloaded_at: DateTime<Utc>,
    },
    ConditionFailedOpen {
        workflow_name: String,
        step: String,
        condition: String,
        error: String,
        evaluated_at: DateTime<Utc>,
    },
    StepSkipped {
        workflow_name: String,
        step: String,
        reason: String,
        skipped_at: DateTime<Utc>,
    },
}

impl RoutingEvent {
    pub fn request_id(&self) -> Option<RoutingRequestId> {
        match self {
            RoutingEvent::GoalMatched { request_id, .. }
            | RoutingEvent::MatcherDegraded { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}
