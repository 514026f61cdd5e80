// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History-aware chat driver
//!
//! Each turn replays the session's full history to the model. The user
//! turn and the reply are recorded together, and only after the model has
//! answered, so a failed call leaves the history exactly as it was.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::repl::Responder;
use crate::config::Settings;
use crate::error::{ApiError, ChainsmithError, Result};
use crate::history::{SessionHistoryStore, Turn};
use crate::llm::provider::{collect_stream, CompletionRequest, LlmProvider};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::prompt::ChatPromptTemplate;

/// Options recognised by the chat driver
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Session used when the caller does not pick one
    pub session_id: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub num_threads: Option<u32>,
    pub stream: bool,
    pub retry: RetryConfig,
}

impl ChatConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            session_id: "default_session".to_string(),
            model: model.into(),
            system_prompt: crate::prompt::templates::CHAT_SYSTEM_TEMPLATE.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            num_threads: None,
            stream: false,
            retry: RetryConfig::default(),
        }
    }

    /// Chat options from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            session_id: settings.chat.default_session.clone(),
            model: settings.models.chat.clone(),
            system_prompt: settings.chat.system_prompt.clone(),
            temperature: settings.chat.temperature,
            max_tokens: settings.chat.max_tokens,
            num_threads: settings.ollama.num_threads,
            stream: settings.chat.stream,
            retry: RetryConfig::from(&settings.resilience),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ChainsmithError::Config(
                "chat model must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChainsmithError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ChainsmithError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(ChainsmithError::Config(
                "num_threads must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives one conversation turn at a time against a shared history store
pub struct ChatDriver {
    store: Arc<SessionHistoryStore>,
    provider: Arc<dyn LlmProvider>,
    prompt: ChatPromptTemplate,
    config: ChatConfig,
}

impl ChatDriver {
    pub fn new(
        store: Arc<SessionHistoryStore>,
        provider: Arc<dyn LlmProvider>,
        config: ChatConfig,
    ) -> Result<Self> {
        config.validate()?;
        let prompt = ChatPromptTemplate::from_system(&config.system_prompt)
            .map_err(|e| ChainsmithError::Config(format!("chat system prompt: {}", e)))?;
        // Nothing fills placeholders in the chat system prompt
        let variables = prompt.system_template().variables();
        if !variables.is_empty() {
            return Err(ChainsmithError::Config(format!(
                "chat system prompt has placeholders with no value: {}",
                variables.join(", ")
            )));
        }

        Ok(Self {
            store,
            provider,
            prompt,
            config,
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionHistoryStore> {
        &self.store
    }

    fn build_request(&self, session_id: &str, input: &str) -> Result<CompletionRequest> {
        let history = self.store.snapshot(session_id);
        let messages = self.prompt.render(&HashMap::new(), &history, input)?;

        tracing::debug!(
            session_id,
            history_turns = history.len(),
            "building chat request"
        );

        Ok(CompletionRequest::new(&self.config.model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_num_threads(self.config.num_threads))
    }

    fn record(&self, session_id: &str, input: &str, reply: String) -> Result<String> {
        if reply.trim().is_empty() {
            return Err(ChainsmithError::Api(ApiError::InvalidResponse(format!(
                "model '{}' returned an empty reply",
                self.config.model
            ))));
        }
        self.store
            .get_or_create(session_id)
            .append_exchange(Turn::user(input), Turn::assistant(reply.clone()));
        Ok(reply)
    }

    /// Send `input` in `session_id` and return the full reply
    pub async fn respond(&self, session_id: &str, input: &str) -> Result<String> {
        let request = self.build_request(session_id, input)?;
        let response = with_retry(
            || self.provider.complete(request.clone()),
            &self.config.retry,
            "chat",
        )
        .await?;

        self.record(session_id, input, response.text)
    }

    /// Like `respond`, but hands each fragment to `on_delta` as it arrives
    pub async fn respond_streaming<F>(
        &self,
        session_id: &str,
        input: &str,
        on_delta: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let request = self.build_request(session_id, input)?;
        // Only opening the stream is retried; a stream that fails midway
        // has already shown partial text
        let stream = with_retry(
            || self.provider.complete_stream(request.clone()),
            &self.config.retry,
            "chat",
        )
        .await?;
        let reply = collect_stream(stream, on_delta).await?;

        self.record(session_id, input, reply)
    }
}

#[async_trait(?Send)]
impl Responder for ChatDriver {
    fn history(&self) -> &SessionHistoryStore {
        &self.store
    }

    fn default_session(&self) -> &str {
        &self.config.session_id
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn reply(
        &self,
        session_id: &str,
        input: &str,
        on_delta: &mut dyn for<'d> FnMut(&'d str),
    ) -> Result<String> {
        if self.config.stream {
            self.respond_streaming(session_id, input, |delta| on_delta(delta))
                .await
        } else {
            self.respond(session_id, input).await
        }
    }
}
