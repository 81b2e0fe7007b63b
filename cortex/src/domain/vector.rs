// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Vector records and search results for the namespaced vector store.
//!
//! One physical store is logically partitioned into namespaces so tool
//! descriptions and workflow descriptions never compete in the same search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Logical partition of the vector store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorNamespace {
    Tools,
    Workflows,
}

impl VectorNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorNamespace::Tools => "TOOLS",
            VectorNamespace::Workflows => "WORKFLOWS",
        }
    }
}

impl fmt::Display for VectorNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored embedding with the text it was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record identifier, unique within its namespace
    pub id: String,
    pub namespace: VectorNamespace,
    pub vector: Vec<f32>,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub indexed_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn new(
        id: impl Into<String>,
        namespace: VectorNamespace,
        vector: Vec<f32>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace,
            vector,
            text: text.into(),
            metadata: HashMap::new(),
            indexed_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A single nearest-neighbour hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub namespace: VectorNamespace,
    /// Cosine similarity in `[-1.0, 1.0]`, higher is closer
    pub score: f64,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Exact-match metadata filter; every entry must be present and equal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    entries: HashMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn matches(&self, metadata: &HashMap<String, Value>) -> bool {
        self.entries
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity between two vectors, `0.0` on dimension mismatch or zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)) as f64
}
