// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Code-then-test generation
//!
//! The code model writes a function for the task, then the test model is
//! shown that function and asked for a test. The code model runs once and
//! its output is what the test prompt embeds.

use std::sync::Arc;

use super::context::ChainContext;
use super::pipeline::Chain;
use super::stage::{ModelOptions, ModelStage, PromptStage, Stage};
use crate::config::Settings;
use crate::error::{ChainsmithError, Result};
use crate::llm::provider::LlmProvider;
use crate::llm::retry::RetryConfig;
use crate::prompt::templates::{CODE_TEMPLATE, TEST_TEMPLATE};
use crate::prompt::PromptTemplate;

pub const DEFAULT_TASK: &str = "return a list of numbers";
pub const DEFAULT_LANGUAGE: &str = "python";

/// What the pipeline produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOutput {
    pub code: String,
    pub test: String,
}

/// Two chained model calls: function first, then its test
pub struct CodegenPipeline {
    chain: Chain,
}

impl CodegenPipeline {
    /// Build the pipeline from explicit model options
    pub fn new(
        code_provider: Arc<dyn LlmProvider>,
        code_options: ModelOptions,
        test_provider: Arc<dyn LlmProvider>,
        test_options: ModelOptions,
    ) -> Result<Self> {
        let code = Chain::new("code")
            .then(PromptStage::new(
                "code_prompt",
                PromptTemplate::from_template(CODE_TEMPLATE)?,
                "code_prompt",
            ))
            .then(ModelStage::new(
                "code_model",
                code_provider,
                code_options,
                "code_prompt",
                "code",
            ));

        let test = Chain::new("test")
            .then(PromptStage::new(
                "test_prompt",
                PromptTemplate::from_template(TEST_TEMPLATE)?,
                "test_prompt",
            ))
            .then(ModelStage::new(
                "test_model",
                test_provider,
                test_options,
                "test_prompt",
                "test",
            ));

        Ok(Self {
            chain: Chain::new("codegen").then(code).then(test),
        })
    }

    /// Build the pipeline with the code and test models from settings
    pub fn from_settings(provider: Arc<dyn LlmProvider>, settings: &Settings) -> Result<Self> {
        let options = |model: &str| ModelOptions {
            model: model.to_string(),
            temperature: settings.chat.temperature,
            max_tokens: settings.chat.max_tokens,
            num_threads: settings.ollama.num_threads,
            retry: RetryConfig::from(&settings.resilience),
        };

        Self::new(
            Arc::clone(&provider),
            options(&settings.models.code),
            provider,
            options(&settings.models.test),
        )
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.stage_names()
    }

    /// Generate a function for `task` in `language`, then a test for it
    pub async fn run(&self, language: &str, task: &str) -> Result<CodegenOutput> {
        if language.trim().is_empty() {
            return Err(ChainsmithError::InvalidInput(
                "language must not be empty".to_string(),
            ));
        }
        if task.trim().is_empty() {
            return Err(ChainsmithError::InvalidInput(
                "task must not be empty".to_string(),
            ));
        }

        tracing::info!(language, task, "generating code and test");

        let ctx = ChainContext::new()
            .with("language", language)
            .with("task", task);
        let mut ctx = self.chain.run(ctx).await?;

        let code = ctx.take("code").ok_or_else(|| missing_output("code"))?;
        let test = ctx.take("test").ok_or_else(|| missing_output("test"))?;
        Ok(CodegenOutput { code, test })
    }
}

fn missing_output(key: &str) -> ChainsmithError {
    ChainsmithError::Chain {
        stage: "codegen".to_string(),
        message: format!("no '{}' produced", key),
    }
}
