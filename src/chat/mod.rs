// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Interactive chat over a session history store
//!
//! `driver` runs a single history-aware turn; `repl` wraps any `Responder`
//! in the terminal loop used by `chainsmith chat` and `chainsmith ask`.

pub mod driver;
pub mod repl;

pub use driver::{ChatConfig, ChatDriver};
pub use repl::{run_repl, ReplCommand, Responder};
