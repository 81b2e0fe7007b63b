// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Matching Domain Model
//!
//! Value objects exchanged between the individual matchers, the ensemble
//! aggregator and the adapter, plus the [`Matcher`] contract every signal
//! source implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::scene::SceneSnapshot;

// ============================================================================
// Matcher contract
// ============================================================================

/// One signal source in the ensemble
///
/// Implementations are stateless per call. "No match" is a result with no
/// workflow and zero confidence, never an error; errors are reserved for
/// genuine failures, which the orchestrator also degrades to zero confidence.
#[async_trait]
pub trait Matcher: Send + Sync {
    fn name(&self) -> &str;

    fn weight(&self) -> f64;

    async fn match_goal(
        &self,
        goal: &str,
        context: Option<&MatchContext>,
    ) -> Result<MatcherResult, MatcherError>;
}

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    VectorStore(String),

    #[error("Matcher '{matcher}' timed out after {timeout_ms}ms")]
    Timeout { matcher: String, timeout_ms: u64 },

    #[error("Matcher failed: {0}")]
    Internal(String),
}

/// Optional per-request hints for matchers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    /// Geometry pattern detected upstream (e.g. `"tower_like"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneSnapshot>,
}

impl MatchContext {
    pub fn with_pattern(pattern: impl Into<String>) -> Self {
        Self {
            detected_pattern: Some(pattern.into()),
            scene: None,
        }
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Output of a single matcher for one goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherResult {
    pub matcher_name: String,
    pub workflow_name: Option<String>,
    /// Always within `[0.0, 1.0]`
    pub confidence: f64,
    pub weight: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl MatcherResult {
    pub fn matched(
        matcher_name: impl Into<String>,
        workflow_name: impl Into<String>,
        confidence: f64,
        weight: f64,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            matcher_name: matcher_name.into(),
            workflow_name: Some(workflow_name.into()),
            confidence,
            weight,
            metadata: BTreeMap::new(),
        }
    }

    pub fn no_match(matcher_name: impl Into<String>, weight: f64) -> Self {
        Self {
            matcher_name: matcher_name.into(),
            workflow_name: None,
            confidence: 0.0,
            weight,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn weighted_score(&self) -> f64 {
        self.confidence * self.weight
    }

    pub fn is_match(&self) -> bool {
        self.workflow_name.is_some() && self.confidence > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    None,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::None => "NONE",
        }
    }

    /// Ordinal used for monotonicity checks; higher keeps more steps
    pub fn rank(&self) -> u8 {
        match self {
            ConfidenceLevel::High => 3,
            ConfidenceLevel::Medium => 2,
            ConfidenceLevel::Low => 1,
            ConfidenceLevel::None => 0,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter overrides derived from modifier phrases in the goal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierResult {
    pub modifiers: BTreeMap<String, Value>,
    /// Modifier phrases found in the goal, in declaration order
    pub matched_keywords: Vec<String>,
}

/// Aggregated decision for one goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub workflow_name: Option<String>,
    /// Normalized score in `[0.0, 1.0]`
    pub final_score: f64,
    pub confidence_level: ConfidenceLevel,
    /// Always populated from the modifier extractor for the winner
    pub modifiers: BTreeMap<String, Value>,
    pub modifier_keywords: Vec<String>,
    /// Weighted score per contributing matcher for the winner
    pub matcher_contributions: BTreeMap<String, f64>,
    pub requires_adaptation: bool,
    pub composition_mode: bool,
    pub extra_workflows: Vec<String>,
}

impl EnsembleResult {
    pub fn none() -> Self {
        Self {
            workflow_name: None,
            final_score: 0.0,
            confidence_level: ConfidenceLevel::None,
            modifiers: BTreeMap::new(),
            modifier_keywords: Vec::new(),
            matcher_contributions: BTreeMap::new(),
            requires_adaptation: false,
            composition_mode: false,
            extra_workflows: Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.workflow_name.is_some() && self.confidence_level != ConfidenceLevel::None
    }
}

/// How the orchestrator runs its matchers; the decision is identical either way
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    #[default]
    Sequential,
    Concurrent,
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "concurrent" | "parallel" => Ok(ExecutionStrategy::Concurrent),
            other => Err(format!("unknown execution strategy '{}'", other)),
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::Sequential => f.write_str("sequential"),
            ExecutionStrategy::Concurrent => f.write_str("concurrent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_result_clamps_confidence() {
        assert_eq!(MatcherResult::matched("semantic", "table", 1.4, 0.4).confidence, 1.0);
        assert_eq!(MatcherResult::matched("semantic", "table", -0.2, 0.4).confidence, 0.0);
        assert_eq!(MatcherResult::matched("semantic", "table", f64::NAN, 0.4).confidence, 0.0);
    }

    #[test]
    fn test_no_match() {
        let result = MatcherResult::no_match("keyword", 0.4);
        assert!(!result.is_match());
        assert_eq!(result.weighted_score(), 0.0);
    }

    #[test]
    fn test_confidence_level_serialization() {
        assert_eq!(serde_json::to_string(&ConfidenceLevel::Medium).unwrap(), "\"MEDIUM\"");
        assert!(ConfidenceLevel::High.rank() > ConfidenceLevel::Medium.rank());
    }

    #[test]
    fn test_execution_strategy_parsing() {
        assert_eq!("Concurrent".parse::<ExecutionStrategy>(), Ok(ExecutionStrategy::Concurrent));
        assert_eq!("sequential".parse::<ExecutionStrategy>(), Ok(ExecutionStrategy::Sequential));
        assert!("random".parse::<ExecutionStrategy>().is_err());
    }
}
