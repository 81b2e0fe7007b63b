// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Semantic Matcher
//!
//! Embeds the goal and searches the `WORKFLOWS` namespace of the vector
//! store. Workflows must be indexed through [`SemanticMatcher::initialize`]
//! first; until then every goal is a no-match.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use scenecraft_cortex::{EmbeddingProvider, VectorNamespace, VectorRecord, VectorStore};

use crate::domain::matching::{MatchContext, Matcher, MatcherError, MatcherResult};
use crate::domain::repository::WorkflowCatalog;

pub struct SemanticMatcher {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    weight: f64,
    min_similarity: f64,
    top_k: usize,
    initialized: AtomicBool,
    /// Workflow ids currently present in the store
    indexed: Mutex<BTreeSet<String>>,
}

impl SemanticMatcher {
    pub const NAME: &'static str = "semantic";

    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        weight: f64,
        min_similarity: f64,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            weight,
            min_similarity,
            top_k: top_k.max(1),
            initialized: AtomicBool::new(false),
            indexed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Index every workflow in the catalog, dropping entries for workflows
    /// that no longer exist. Safe to call again after a reload.
    pub async fn initialize(&self, catalog: &WorkflowCatalog) -> Result<usize> {
        let definitions: Vec<_> = catalog.iter().cloned().collect();
        let texts: Vec<String> = definitions.iter().map(|d| d.semantic_text()).collect();

        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed workflow descriptions")?;

        let records: Vec<VectorRecord> = definitions
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((definition, text), vector)| {
                VectorRecord::new(definition.name.clone(), VectorNamespace::Workflows, vector, text)
                    .with_metadata("workflow", json!(definition.name))
            })
            .collect();

        let current: BTreeSet<String> = definitions.iter().map(|d| d.name.clone()).collect();
        let stale: Vec<String> = {
            let indexed = self.indexed.lock();
            indexed.difference(&current).cloned().collect()
        };
        if !stale.is_empty() {
            self.store
                .delete(&stale, VectorNamespace::Workflows)
                .await
                .context("Failed to remove stale workflow embeddings")?;
        }

        let written = self
            .store
            .upsert(records)
            .await
            .context("Failed to index workflow embeddings")?;

        *self.indexed.lock() = current;
        self.initialized.store(true, Ordering::Release);

        info!(indexed = written, removed = stale.len(), "Semantic workflow index ready");
        Ok(written)
    }
}

#[async_trait]
impl Matcher for SemanticMatcher {
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
        if !self.is_initialized() {
            debug!("Semantic matcher queried before initialization");
            return Ok(MatcherResult::no_match(Self::NAME, self.weight)
                .with_metadata("reason", json!("not_initialized")));
        }

        let vector = self
            .embedder
            .embed(goal)
            .await
            .map_err(|e| MatcherError::Embedding(e.to_string()))?;

        let hits = self
            .store
            .search(
                &vector,
                VectorNamespace::Workflows,
                self.top_k,
                self.min_similarity,
                None,
            )
            .await
            .map_err(|e| MatcherError::VectorStore(e.to_string()))?;

        Ok(match hits.into_iter().next() {
            Some(hit) => {
                debug!(workflow = %hit.id, similarity = hit.score, "Semantic match");
                MatcherResult::matched(Self::NAME, hit.id, hit.score, self.weight)
                    .with_metadata("similarity", json!(hit.score))
            }
            None => MatcherResult::no_match(Self::NAME, self.weight),
        })
    }
}
