// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for chainsmith
//!
//! The history store is total and never produces these; they come from
//! inference, template rendering, configuration and the CLI.

use thiserror::Error;

/// Main error type for chainsmith operations
#[derive(Error, Debug)]
pub enum ChainsmithError {
    /// Inference API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template rendering errors (missing variables)
    #[error("Template error: {0}")]
    Template(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A chain stage failed
    #[error("Chain stage '{stage}' failed: {message}")]
    Chain { stage: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for chainsmith operations
pub type Result<T> = std::result::Result<T, ChainsmithError>;

impl ChainsmithError {
    /// Wrap an error raised inside a named chain stage
    pub fn in_stage(stage: impl Into<String>, err: ChainsmithError) -> Self {
        match err {
            // Keep the innermost stage name when chains are nested
            ChainsmithError::Chain { .. } => err,
            other => ChainsmithError::Chain {
                stage: stage.into(),
                message: other.to_string(),
            },
        }
    }
}
