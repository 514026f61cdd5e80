// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt chains
//!
//! A chain is an explicit ordered list of stages. Each stage maps a
//! context of named variables to a new context; nothing is shared between
//! runs.

pub mod codegen;
pub mod context;
pub mod pipeline;
pub mod stage;

pub use codegen::{CodegenOutput, CodegenPipeline};
pub use context::ChainContext;
pub use pipeline::Chain;
pub use stage::{ModelOptions, ModelStage, PromptStage, Stage};
