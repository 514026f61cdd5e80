// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Separator-based text splitting
//!
//! Text is cut on a separator and the pieces are greedily merged back into
//! chunks of at most `chunk_size` characters. Consecutive chunks share up
//! to `chunk_overlap` characters of trailing pieces. A single piece longer
//! than `chunk_size` becomes a chunk on its own.

use std::collections::VecDeque;

use crate::config::RetrievalSettings;
use crate::error::{ChainsmithError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl TextSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separator: impl Into<String>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChainsmithError::InvalidInput(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChainsmithError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: separator.into(),
        })
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Result<Self> {
        Self::new(
            settings.chunk_size,
            settings.chunk_overlap,
            settings.separator.clone(),
        )
    }

    /// Split `text` into trimmed, non-empty chunks in document order
    pub fn split(&self, text: &str) -> Vec<String> {
        let sep_len = self.separator.chars().count();
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        // Length of the window's pieces joined by the separator
        let mut total = 0usize;

        for piece in text.split(self.separator.as_str()).filter(|p| !p.is_empty()) {
            let len = piece.chars().count();
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if !window.is_empty() && total + joiner + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        size = total,
                        limit = self.chunk_size,
                        "chunk longer than the configured size"
                    );
                }
                self.emit(&window, &mut chunks);

                while let Some(&(_, first_len)) = window.front() {
                    let joiner = if window.is_empty() { 0 } else { sep_len };
                    let too_long = total + joiner + len > self.chunk_size;
                    if total <= self.chunk_overlap && !too_long {
                        break;
                    }
                    window.pop_front();
                    total -= first_len + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back((piece, len));
        }

        self.emit(&window, &mut chunks);
        chunks
    }

    fn emit(&self, window: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
        let joined = window
            .iter()
            .map(|(piece, _)| *piece)
            .collect::<Vec<_>>()
            .join(&self.separator);
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}
