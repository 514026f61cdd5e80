// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session history store implementation
//!
//! Maps session identifiers to append-only conversation logs. Histories
//! are created on first reference, never reordered or truncated, and live
//! as long as the store. Nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::turn::Turn;

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("{} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

/// Shared handle to one session's history
///
/// Cloning the handle does not copy the history; all clones observe the
/// same turns.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    turns: Arc<RwLock<Vec<Turn>>>,
}

impl SessionHistory {
    fn new() -> Self {
        Self::default()
    }

    /// Append one turn to the end of the history
    pub fn append(&self, turn: Turn) {
        write_lock(&self.turns, "session history").push(turn);
    }

    /// Append a user turn and the assistant reply under a single lock
    pub fn append_exchange(&self, user: Turn, assistant: Turn) {
        let mut turns = write_lock(&self.turns, "session history");
        turns.push(user);
        turns.push(assistant);
    }

    /// Copy of the ordered history
    pub fn snapshot(&self) -> Vec<Turn> {
        read_lock(&self.turns, "session history").clone()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.turns, "session history").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same underlying history
    pub fn ptr_eq(&self, other: &SessionHistory) -> bool {
        Arc::ptr_eq(&self.turns, &other.turns)
    }
}

/// In-memory store of session histories
///
/// The top-level map and each history are locked independently, so work
/// on one session never waits on another session's appends.
#[derive(Debug, Default)]
pub struct SessionHistoryStore {
    sessions: RwLock<HashMap<String, SessionHistory>>,
}

impl SessionHistoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the history for `session_id`, registering an empty one on first contact
    pub fn get_or_create(&self, session_id: &str) -> SessionHistory {
        if let Some(history) = read_lock(&self.sessions, "session map").get(session_id) {
            return history.clone();
        }

        let mut sessions = write_lock(&self.sessions, "session map");
        // Another caller may have registered it between the two locks
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id, "creating session history");
                SessionHistory::new()
            })
            .clone()
    }

    /// Append a turn to the history for `session_id`
    pub fn append(&self, session_id: &str, turn: Turn) {
        self.get_or_create(session_id).append(turn);
    }

    /// Ordered copy of the history for `session_id`
    pub fn snapshot(&self, session_id: &str) -> Vec<Turn> {
        self.get_or_create(session_id).snapshot()
    }

    /// Whether a history has been registered for `session_id`
    pub fn contains(&self, session_id: &str) -> bool {
        read_lock(&self.sessions, "session map").contains_key(session_id)
    }

    /// Registered session identifiers, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read_lock(&self.sessions, "session map")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        read_lock(&self.sessions, "session map").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
