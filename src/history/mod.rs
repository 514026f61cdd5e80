// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session history for chat conversations
//!
//! Keeps one append-only log of turns per session identifier, in memory,
//! for as long as the store lives.

pub mod store;
pub mod turn;

pub use store::{SessionHistory, SessionHistoryStore};
pub use turn::{Turn, TurnRole};
