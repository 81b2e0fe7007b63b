// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interfaces for the Cortex bounded context
//! Defines the contract for the namespaced vector store

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MetadataFilter, SearchResult, VectorNamespace, VectorRecord};

/// Nearest-neighbour store over pre-computed embeddings
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records (keyed by namespace + id); returns how many were written
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, VectorStoreError>;

    /// Search one namespace, returning at most `top_k` hits with `score >= threshold`,
    /// best first
    async fn search(
        &self,
        vector: &[f32],
        namespace: VectorNamespace,
        top_k: usize,
        threshold: f64,
        metadata_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, VectorStoreError>;

    /// Delete records by id; returns how many existed
    async fn delete(&self, ids: &[String], namespace: VectorNamespace) -> Result<usize, VectorStoreError>;

    /// Count records in one namespace, or across all of them
    async fn count(&self, namespace: Option<VectorNamespace>) -> Result<usize, VectorStoreError>;
}

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Vector dimension mismatch: store uses {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Empty vector for record '{0}'")]
    EmptyVector(String),

    #[error("Vector store backend error: {0}")]
    Backend(String),
}
