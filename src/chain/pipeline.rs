// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sequential composition of stages

use async_trait::async_trait;

use super::context::ChainContext;
use super::stage::Stage;
use crate::error::{ChainsmithError, Result};

/// An ordered list of stages run one after another
pub struct Chain {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[async_trait]
impl Stage for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ChainContext) -> Result<ChainContext> {
        let mut ctx = ctx;
        for stage in &self.stages {
            tracing::debug!(chain = %self.name, stage = stage.name(), "running stage");
            ctx = stage
                .run(ctx)
                .await
                .map_err(|e| ChainsmithError::in_stage(stage.name(), e))?;
        }
        Ok(ctx)
    }
}
