// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chain stages
//!
//! A stage takes the context, reads the variables it needs, and returns
//! the context with its output added.

use async_trait::async_trait;
use std::sync::Arc;

use super::context::ChainContext;
use crate::error::{ApiError, ChainsmithError, Result};
use crate::llm::message::Message;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::prompt::PromptTemplate;

/// One step of a chain
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn run(&self, ctx: ChainContext) -> Result<ChainContext>;
}

/// Renders a template from the context into `output_key`
pub struct PromptStage {
    name: String,
    template: PromptTemplate,
    output_key: String,
}

impl PromptStage {
    pub fn new(
        name: impl Into<String>,
        template: PromptTemplate,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            output_key: output_key.into(),
        }
    }
}

#[async_trait]
impl Stage for PromptStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut ctx: ChainContext) -> Result<ChainContext> {
        let rendered = self.template.format(ctx.vars())?;
        ctx.insert(self.output_key.clone(), rendered);
        Ok(ctx)
    }
}

/// Generation parameters for a model stage
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub num_threads: Option<u32>,
    pub retry: RetryConfig,
}

impl ModelOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: 2048,
            num_threads: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Sends the prompt at `input_key` to a model and stores the reply at `output_key`
pub struct ModelStage {
    name: String,
    provider: Arc<dyn LlmProvider>,
    options: ModelOptions,
    input_key: String,
    output_key: String,
}

impl ModelStage {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        options: ModelOptions,
        input_key: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            options,
            input_key: input_key.into(),
            output_key: output_key.into(),
        }
    }
}

#[async_trait]
impl Stage for ModelStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, mut ctx: ChainContext) -> Result<ChainContext> {
        let prompt = ctx.require(&self.input_key)?.to_string();
        let request = CompletionRequest::new(&self.options.model, vec![Message::user(prompt)])
            .with_temperature(self.options.temperature)
            .with_max_tokens(self.options.max_tokens)
            .with_num_threads(self.options.num_threads);

        tracing::debug!(
            stage = %self.name,
            provider = self.provider.name(),
            model = %self.options.model,
            "invoking model"
        );

        let response = with_retry(
            || self.provider.complete(request.clone()),
            &self.options.retry,
            &self.name,
        )
        .await?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(ChainsmithError::Api(ApiError::InvalidResponse(format!(
                "model '{}' returned an empty completion",
                self.options.model
            ))));
        }

        tracing::debug!(
            stage = %self.name,
            output_tokens = response.usage.output_tokens,
            "model finished"
        );
        ctx.insert(self.output_key.clone(), text);
        Ok(ctx)
    }
}
