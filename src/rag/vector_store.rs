// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory vector store with cosine similarity search
//!
//! Brute force over every stored chunk, which is plenty for a handful of
//! documents held for one process.

use super::document::Chunk;
use crate::error::{ChainsmithError, Result};

/// A retrieved chunk and how close it is to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    entries: Vec<(Chunk, Vec<f32>)>,
    /// Fixed by the first insert
    dimension: Option<usize>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a chunk with its embedding
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(ChainsmithError::InvalidInput(format!(
                "empty embedding for chunk {} of {}",
                chunk.index, chunk.source
            )));
        }
        match self.dimension {
            Some(dimension) if dimension != vector.len() => {
                return Err(ChainsmithError::InvalidInput(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    dimension,
                    vector.len()
                )));
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }
        self.entries.push((chunk, vector));
        Ok(())
    }

    /// The `k` chunks most similar to `query`, best first
    ///
    /// Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        if let Some(dimension) = self.dimension {
            if query.len() != dimension {
                tracing::warn!(
                    "Query dimension mismatch: expected {}, got {}",
                    dimension,
                    query.len()
                );
                return vec![];
            }
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity in [-1, 1]; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
