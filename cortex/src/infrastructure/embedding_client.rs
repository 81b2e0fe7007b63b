// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! Text to fixed-length vector conversion used by the semantic matcher and
//! the workflow adapter's similarity fallback.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Deterministic hashed bag-of-words embeddings (384 dims, the
//!   all-MiniLM-L6-v2 width) so a model-backed provider can be swapped in
//!   behind [`EmbeddingProvider`] without touching callers

use anyhow::{bail, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Dimension of vectors produced by [`EmbeddingClient`]
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Black-box text embedder
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder
///
/// Each lowercase word token and each adjacent word pair is hashed into a
/// bucket with a hash-derived sign; the result is L2-normalized. Texts that
/// share vocabulary get a high cosine similarity, unrelated texts stay near
/// zero, and the same text always yields the same vector. Features are keyed
/// with BLAKE3 so vectors persisted by one build match those of any other.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Generate embedding for text
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            bail!("embedding dimension must be greater than zero");
        }

        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()).collect();

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }

        Ok(vector)
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = feature_hash(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

/// First eight bytes of the BLAKE3 digest, little-endian
fn feature_hash(feature: &str) -> u64 {
    let digest = blake3::hash(feature.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

impl Default for EmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embedding(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
