// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Provides a configurable mock implementation of the LlmProvider trait
//! that can be used in unit tests without a running Ollama server.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, ChainsmithError, Result};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, EventStream, LlmProvider, StopReason, StreamEvent,
    Usage,
};

/// A scripted outcome for one call
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this text
    Text(String),
    /// Fail with a network error carrying this message
    Fail(String),
}

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Configured responses
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider that answers "Mock response"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::Text(
                "Mock response".to_string(),
            )])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create a mock provider with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.name = name.into();
        provider
    }

    /// Set a single text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::Text(text.into())])
    }

    /// Queue multiple text responses (returned in order, last one repeats)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.with_script(texts.into_iter().map(MockResponse::Text).collect())
    }

    /// Queue an arbitrary mix of replies and failures
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        {
            let mut responses = lock(&self.responses);
            responses.clear();
            responses.extend(script);
        }
        self
    }

    /// Get the number of times the provider was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn record(&self, request: &CompletionRequest) {
        lock(&self.recorded_requests).push(request.clone());
    }

    /// Get the next scripted outcome
    fn next_response(&self) -> Result<String> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        let response = if responses.is_empty() {
            MockResponse::Text(String::new())
        } else {
            responses[count.min(responses.len() - 1)].clone()
        };
        match response {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Fail(message) => Err(ChainsmithError::Api(ApiError::Network(message))),
        }
    }

    fn usage(text: &str) -> Usage {
        Usage {
            input_tokens: 10,
            output_tokens: (text.len() / 4).max(1) as u32,
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.record(&request);
        let text = self.next_response()?;

        Ok(CompletionResponse {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            model: request.model,
            usage: Self::usage(&text),
            text,
            stop_reason: Some(StopReason::EndTurn),
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        self.record(&request);
        let text = self.next_response()?;

        // Stream the text in chunks
        let mut events: Vec<Result<StreamEvent>> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(10)
            .map(|chunk| Ok(StreamEvent::TextDelta(chunk.iter().collect())))
            .collect();
        events.push(Ok(StreamEvent::Done {
            stop_reason: Some(StopReason::EndTurn),
            usage: Self::usage(&text),
        }));

        Ok(Box::pin(stream::iter(events)))
    }
}
