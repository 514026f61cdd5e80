// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chainsmith - prompt chains and history-aware chat on local models.
//!
//! This crate exposes the runtime used by the `chainsmith` CLI
//! (`src/main.rs`):
//! - `history`: per-session conversation store shared by chat turns
//! - `prompt`: `{name}` templates and the chat message layout
//! - `llm`: provider abstraction, the Ollama client and retry handling
//! - `chain`: ordered stages and the code-then-test pipeline
//! - `chat`: history-aware driver and the interactive loop
//! - `rag`: document chunking, embeddings and retrieval question answering

pub mod chain;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod rag;

pub use error::{ChainsmithError, Result};
