// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Source documents and the chunks cut from them

use std::path::Path;

use uuid::Uuid;

use super::splitter::TextSplitter;
use crate::error::{ChainsmithError, Result};

/// A loaded text document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text came from, shown next to answers
    pub source: String,
    pub text: String,
}

/// A piece of a document small enough to embed
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub source: String,
    /// Position of the chunk within its document
    pub index: usize,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Read a UTF-8 text file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ChainsmithError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), chars = text.chars().count(), "loaded document");
        Ok(Self::new(path.display().to_string(), text))
    }

    /// Split into chunks tagged with this document's source
    pub fn chunks(&self, splitter: &TextSplitter) -> Vec<Chunk> {
        splitter
            .split(&self.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: Uuid::new_v4(),
                source: self.source.clone(),
                index,
                text,
            })
            .collect()
    }
}
