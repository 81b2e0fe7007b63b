// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for Cortex bounded context

pub mod repository;
pub mod in_memory_store;
pub mod embedding_client;

pub use repository::{VectorStore, VectorStoreError};
pub use in_memory_store::InMemoryVectorStore;
pub use embedding_client::{EmbeddingClient, EmbeddingProvider, DEFAULT_EMBEDDING_DIMENSION};
