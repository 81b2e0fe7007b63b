// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cortex
//!
//! Embedding and vector-search collaborators consumed by the router core.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** `EmbeddingProvider` and `VectorStore` contracts plus
//!   in-process reference implementations

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
