// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for chainsmith
//!
//! Handles loading and saving settings from ~/.chainsmith/settings.json

use serde::{Deserialize, Serialize};

use crate::llm::providers::ollama::DEFAULT_OLLAMA_URL;

mod io;
mod validation;

/// Main settings structure, stored in ~/.chainsmith/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Ollama connection settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Which model serves which role
    #[serde(default)]
    pub models: ModelsConfig,

    /// Interactive chat settings
    #[serde(default)]
    pub chat: ChatSettings,

    /// Question answering over documents
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Retry settings for inference calls
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Ollama connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// CPU threads Ollama may use per request (None = Ollama decides)
    #[serde(default = "default_num_threads")]
    pub num_threads: Option<u32>,
}

/// Model assignment per role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelsConfig {
    /// Model that writes the function
    #[serde(default = "default_code_model")]
    pub code: String,

    /// Model that writes the test for the function
    #[serde(default = "default_test_model")]
    pub test: String,

    /// Model used by the interactive chat
    #[serde(default = "default_chat_model")]
    pub chat: String,

    /// Model that answers questions about documents
    #[serde(default = "default_qa_model")]
    pub qa: String,

    /// Model that embeds document chunks and questions
    #[serde(default = "default_embedding_model")]
    pub embedding: String,
}

/// Interactive chat configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSettings {
    /// System prompt placed before the history on every turn
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Session used when none is given on the command line
    #[serde(default = "default_session")]
    pub default_session: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Print replies as they are generated
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Document question answering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalSettings {
    /// System prompt; `{context}` receives the retrieved chunks
    #[serde(default = "default_qa_system_prompt")]
    pub system_prompt: String,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by neighbouring chunks
    #[serde(default)]
    pub chunk_overlap: usize,

    /// Text the documents are split on
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Retry and backoff configuration for inference calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage (0.0 to 1.0) for randomizing delays
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            num_threads: default_num_threads(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            code: default_code_model(),
            test: default_test_model(),
            chat: default_chat_model(),
            qa: default_qa_model(),
            embedding: default_embedding_model(),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_qa_system_prompt(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            separator: default_separator(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            default_session: default_session(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stream: default_stream(),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_ollama_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    // Local 13B models on CPU can take minutes per answer
    600
}

fn default_num_threads() -> Option<u32> {
    Some(8)
}

fn default_code_model() -> String {
    "mistral:latest".to_string()
}

fn default_test_model() -> String {
    "llama3:8b-instruct-q4_0".to_string()
}

fn default_chat_model() -> String {
    "mistral:latest".to_string()
}

fn default_qa_model() -> String {
    "llama3:latest".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm:latest".to_string()
}

fn default_qa_system_prompt() -> String {
    crate::prompt::templates::QA_SYSTEM_TEMPLATE.to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_separator() -> String {
    " ".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_system_prompt() -> String {
    crate::prompt::templates::CHAT_SYSTEM_TEMPLATE.to_string()
}

fn default_session() -> String {
    "default_session".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_stream() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    4000
}

fn default_jitter() -> f64 {
    0.25
}
