// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Question answering over documents
//!
//! Documents are split into chunks, embedded, and kept in an in-memory
//! vector store. Each question retrieves the closest chunks and the model
//! answers with them as context, alongside the session's earlier turns.

pub mod document;
pub mod embedder;
pub mod qa;
pub mod splitter;
pub mod vector_store;

pub use document::{Chunk, Document};
pub use embedder::Embedder;
pub use qa::{Answer, QaConfig, RetrievalQa};
pub use splitter::TextSplitter;
pub use vector_store::{cosine_similarity, ScoredChunk, VectorStore};
