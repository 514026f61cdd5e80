// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ChainsmithError, Result};
use crate::prompt::PromptTemplate;

use super::Settings;

impl Settings {
    /// Get the Ollama base URL, checking the OLLAMA_HOST env var first.
    pub fn ollama_base_url(&self) -> String {
        // Priority: env var > config file.
        match std::env::var("OLLAMA_HOST") {
            Ok(host) if !host.trim().is_empty() => normalize_host(host.trim()),
            _ => self.ollama.base_url.clone(),
        }
    }

    /// Reject settings that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        let base_url = &self.ollama.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ChainsmithError::Config(format!(
                "ollama.base_url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        if self.ollama.request_timeout_secs == 0 {
            return Err(ChainsmithError::Config(
                "ollama.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ollama.num_threads == Some(0) {
            return Err(ChainsmithError::Config(
                "ollama.num_threads must be greater than 0 when set".to_string(),
            ));
        }

        for (role, model) in [
            ("code", &self.models.code),
            ("test", &self.models.test),
            ("chat", &self.models.chat),
            ("qa", &self.models.qa),
            ("embedding", &self.models.embedding),
        ] {
            if model.trim().is_empty() {
                return Err(ChainsmithError::Config(format!(
                    "models.{} must not be empty",
                    role
                )));
            }
        }

        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ChainsmithError::Config(format!(
                "chat.temperature must be between 0.0 and 2.0, got {}",
                self.chat.temperature
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(ChainsmithError::Config(
                "chat.max_tokens must be greater than 0".to_string(),
            ));
        }

        check_prompt("chat.system_prompt", &self.chat.system_prompt, &[])?;
        check_prompt(
            "retrieval.system_prompt",
            &self.retrieval.system_prompt,
            &["context"],
        )?;

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 {
            return Err(ChainsmithError::Config(
                "retrieval.chunk_size must be greater than 0".to_string(),
            ));
        }
        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(ChainsmithError::Config(format!(
                "retrieval.chunk_overlap ({}) must be smaller than retrieval.chunk_size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }
        if retrieval.top_k == 0 {
            return Err(ChainsmithError::Config(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }

        let resilience = &self.resilience;
        if !(0.0..=1.0).contains(&resilience.jitter) {
            return Err(ChainsmithError::Config(format!(
                "resilience.jitter must be between 0.0 and 1.0, got {}",
                resilience.jitter
            )));
        }
        if resilience.base_delay_ms > resilience.max_delay_ms {
            return Err(ChainsmithError::Config(
                "resilience.base_delay_ms must not exceed resilience.max_delay_ms".to_string(),
            ));
        }

        Ok(())
    }
}

/// A system prompt must parse and use only the placeholders filled for it
fn check_prompt(field: &str, text: &str, allowed: &[&str]) -> Result<()> {
    let template = PromptTemplate::from_template(text)
        .map_err(|e| ChainsmithError::Config(format!("{}: {}", field, e)))?;
    if let Some(name) = template
        .variables()
        .into_iter()
        .find(|name| !allowed.contains(name))
    {
        return Err(ChainsmithError::Config(format!(
            "{} uses unknown placeholder '{{{}}}'",
            field, name
        )));
    }
    Ok(())
}

/// OLLAMA_HOST may be a bare host:port
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", host.trim_end_matches('/'))
    }
}
