// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Variables passed from stage to stage

use std::collections::HashMap;

use crate::error::{ChainsmithError, Result};

/// Named string variables flowing through a chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainContext {
    vars: HashMap<String, String>,
}

impl ChainContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a variable, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Get a variable a stage cannot run without
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ChainsmithError::InvalidInput(format!("context has no variable '{}'", key))
        })
    }

    /// Remove and return a variable
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ChainContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        for (k, v) in iter {
            ctx.insert(k, v);
        }
        ctx
    }
}
