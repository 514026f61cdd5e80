// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retrieval question answering
//!
//! A question is embedded, the closest chunks are placed into the system
//! prompt as `{context}`, and the model answers with the session's earlier
//! questions and answers in front of the new question. As in chat, the
//! exchange is recorded only once the model has answered.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::document::{Chunk, Document};
use super::embedder::Embedder;
use super::splitter::TextSplitter;
use super::vector_store::{ScoredChunk, VectorStore};
use crate::chat::Responder;
use crate::config::Settings;
use crate::error::{ApiError, ChainsmithError, Result};
use crate::history::{SessionHistoryStore, Turn};
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{with_retry, RetryConfig};
use crate::prompt::ChatPromptTemplate;

/// Chunks sent to the embedding model per request
pub const EMBED_BATCH_SIZE: usize = 32;

const CONTEXT_VARIABLE: &str = "context";

#[derive(Debug, Clone)]
pub struct QaConfig {
    /// Session used when the caller does not pick one
    pub session_id: String,
    /// Model that writes the answer
    pub model: String,
    pub embedding_model: String,
    /// May contain `{context}` and nothing else
    pub system_prompt: String,
    /// Chunks retrieved per question
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub num_threads: Option<u32>,
    pub retry: RetryConfig,
}

impl QaConfig {
    pub fn new(model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            session_id: "default_session".to_string(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            system_prompt: crate::prompt::templates::QA_SYSTEM_TEMPLATE.to_string(),
            top_k: 5,
            temperature: 0.7,
            max_tokens: 2048,
            num_threads: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            session_id: settings.chat.default_session.clone(),
            model: settings.models.qa.clone(),
            embedding_model: settings.models.embedding.clone(),
            system_prompt: settings.retrieval.system_prompt.clone(),
            top_k: settings.retrieval.top_k,
            temperature: settings.chat.temperature,
            max_tokens: settings.chat.max_tokens,
            num_threads: settings.ollama.num_threads,
            retry: RetryConfig::from(&settings.resilience),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ChainsmithError::Config(
                "answer model must not be empty".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ChainsmithError::Config(
                "embedding model must not be empty".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(ChainsmithError::Config(
                "top_k must be greater than 0".to_string(),
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

/// The model's answer and the chunks it was given
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

/// Answers questions from indexed documents, remembering each session
pub struct RetrievalQa {
    store: Arc<SessionHistoryStore>,
    provider: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
    prompt: ChatPromptTemplate,
    index: VectorStore,
    config: QaConfig,
}

impl RetrievalQa {
    pub fn new(
        store: Arc<SessionHistoryStore>,
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        config: QaConfig,
    ) -> Result<Self> {
        config.validate()?;
        let prompt = ChatPromptTemplate::from_system(&config.system_prompt)
            .map_err(|e| ChainsmithError::Config(format!("answer system prompt: {}", e)))?;
        if let Some(name) = prompt
            .system_template()
            .variables()
            .into_iter()
            .find(|name| *name != CONTEXT_VARIABLE)
        {
            return Err(ChainsmithError::Config(format!(
                "answer system prompt uses unknown placeholder '{{{}}}'",
                name
            )));
        }

        Ok(Self {
            store,
            provider,
            embedder,
            prompt,
            index: VectorStore::new(),
            config,
        })
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionHistoryStore> {
        &self.store
    }

    /// Number of chunks available for retrieval
    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    /// Split, embed and index `documents`; returns the number of new chunks
    ///
    /// Either every chunk is indexed or, on error, none are.
    pub async fn add_documents(
        &mut self,
        documents: &[Document],
        splitter: &TextSplitter,
    ) -> Result<usize> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| d.chunks(splitter)).collect();

        let mut vectors = Vec::with_capacity(chunks.len());
        for (n, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            tracing::debug!(batch = n, size = texts.len(), "embedding chunks");
            vectors.extend(self.embed(&texts).await?);
        }

        let mut index = self.index.clone();
        for (chunk, vector) in chunks.iter().cloned().zip(vectors) {
            index.insert(chunk, vector)?;
        }
        self.index = index;

        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            total = self.index.len(),
            "indexed documents"
        );
        Ok(chunks.len())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = with_retry(
            || self.embedder.embed(&self.config.embedding_model, texts),
            &self.config.retry,
            "embed",
        )
        .await?;

        if vectors.len() != texts.len() {
            return Err(ChainsmithError::Api(ApiError::InvalidResponse(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ))));
        }
        Ok(vectors)
    }

    /// The chunks closest to `question`, best first
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() {
            return Err(ChainsmithError::InvalidInput(
                "no documents have been indexed".to_string(),
            ));
        }

        let query = self
            .embed(&[question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                ChainsmithError::Api(ApiError::InvalidResponse(
                    "no embedding returned for the question".to_string(),
                ))
            })?;
        Ok(self.index.search(&query, self.config.top_k))
    }

    /// Answer `question` in `session_id` from the indexed documents
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(ChainsmithError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let sources = self.retrieve(question).await?;
        let context = sources
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let history = self.store.snapshot(session_id);
        let vars = HashMap::from([(CONTEXT_VARIABLE.to_string(), context)]);
        let messages = self.prompt.render(&vars, &history, question)?;

        tracing::debug!(
            session_id,
            history_turns = history.len(),
            sources = sources.len(),
            "building answer request"
        );

        let request = CompletionRequest::new(&self.config.model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_num_threads(self.config.num_threads);
        let response = with_retry(
            || self.provider.complete(request.clone()),
            &self.config.retry,
            "answer",
        )
        .await?;

        if response.text.trim().is_empty() {
            return Err(ChainsmithError::Api(ApiError::InvalidResponse(format!(
                "model '{}' returned an empty answer",
                self.config.model
            ))));
        }

        self.store
            .get_or_create(session_id)
            .append_exchange(Turn::user(question), Turn::assistant(response.text.clone()));

        Ok(Answer {
            text: response.text,
            sources,
        })
    }
}

#[async_trait(?Send)]
impl Responder for RetrievalQa {
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
        _on_delta: &mut dyn for<'d> FnMut(&'d str),
    ) -> Result<String> {
        let answer = self.ask(session_id, input).await?;
        for source in &answer.sources {
            tracing::debug!(
                source = %source.chunk.source,
                chunk = source.chunk.index,
                score = source.score,
                "answer source"
            );
        }
        Ok(answer.text)
    }
}
