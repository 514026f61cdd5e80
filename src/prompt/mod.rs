// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt rendering

pub mod template;
pub mod templates;

pub use template::{ChatPromptTemplate, PromptTemplate};
