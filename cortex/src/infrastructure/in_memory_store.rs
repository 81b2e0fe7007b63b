// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory vector store
//!
//! Brute-force cosine search behind a `tokio::sync::RwLock`. Adequate for the
//! workflow namespace (tens to hundreds of records) and for tests; a
//! persistent backend implements the same [`VectorStore`] trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{cosine_similarity, MetadataFilter, SearchResult, VectorNamespace, VectorRecord};
use crate::infrastructure::repository::{VectorStore, VectorStoreError};

type RecordKey = (VectorNamespace, String);

#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    records: Arc<RwLock<HashMap<RecordKey, VectorRecord>>>,
    dimension: Arc<RwLock<Option<usize>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, VectorStoreError> {
        let mut dimension = self.dimension.write().await;

        // Validate the whole batch before touching the map
        let mut expected = *dimension;
        for record in &records {
            if record.vector.is_empty() {
                return Err(VectorStoreError::EmptyVector(record.id.clone()));
            }
            match expected {
                Some(dim) if dim != record.vector.len() => {
                    return Err(VectorStoreError::DimensionMismatch {
                        expected: dim,
                        got: record.vector.len(),
                    });
                }
                None => expected = Some(record.vector.len()),
                _ => {}
            }
        }
        *dimension = expected;

        let mut store = self.records.write().await;
        let written = records.len();
        for record in records {
            store.insert((record.namespace, record.id.clone()), record);
        }

        debug!(written, total = store.len(), "Upserted vector records");
        Ok(written)
    }

    async fn search(
        &self,
        vector: &[f32],
        namespace: VectorNamespace,
        top_k: usize,
        threshold: f64,
        metadata_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        if let Some(dim) = *self.dimension.read().await {
            if dim != vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
        }

        let store = self.records.read().await;
        let mut results: Vec<SearchResult> = store
            .values()
            .filter(|record| record.namespace == namespace)
            .filter(|record| metadata_filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| SearchResult {
                id: record.id.clone(),
                namespace: record.namespace,
                score: cosine_similarity(vector, &record.vector),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .filter(|result| result.score >= threshold)
            .collect();

        // Score descending, id ascending so equal scores come back in a stable order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(top_k);

        Ok(results)
    }

    async fn delete(&self, ids: &[String], namespace: VectorNamespace) -> Result<usize, VectorStoreError> {
        let mut store = self.records.write().await;
        let removed = ids
            .iter()
            .filter(|id| store.remove(&(namespace, (*id).clone())).is_some())
            .count();
        Ok(removed)
    }

    async fn count(&self, namespace: Option<VectorNamespace>) -> Result<usize, VectorStoreError> {
        let store = self.records.read().await;
        Ok(match namespace {
            Some(ns) => store.keys().filter(|(record_ns, _)| *record_ns == ns).count(),
            None => store.len(),
        })
    }
}
