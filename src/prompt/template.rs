// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt templates with `{name}` placeholders
//!
//! `{{` and `}}` render as literal braces. Templates are parsed once and
//! rendering is pure string substitution.

use std::collections::HashMap;

use crate::error::{ChainsmithError, Result};
use crate::history::Turn;
use crate::llm::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed string template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl PromptTemplate {
    /// Parse a template
    pub fn from_template(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(ChainsmithError::InvalidInput(format!(
                            "unclosed '{{' in template: {}",
                            source
                        )));
                    }
                    let name = name.trim().to_string();
                    if !is_valid_name(&name) {
                        return Err(ChainsmithError::InvalidInput(format!(
                            "invalid placeholder '{{{}}}' in template",
                            name
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => {
                    return Err(ChainsmithError::InvalidInput(format!(
                        "single '}}' in template: {}",
                        source
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Render with the given variables; extra variables are ignored
    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = vars.get(name).ok_or_else(|| {
                        ChainsmithError::Template(format!(
                            "missing variable '{}' (template expects: {})",
                            name,
                            self.variables().join(", ")
                        ))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Convenience for rendering from `(name, value)` pairs
    pub fn format_with(&self, pairs: &[(&str, &str)]) -> Result<String> {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.format(&vars)
    }
}

/// System message followed by the conversation so far and the new input
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    system: PromptTemplate,
}

impl ChatPromptTemplate {
    pub fn new(system: PromptTemplate) -> Self {
        Self { system }
    }

    /// Parse the system template text
    pub fn from_system(system: impl Into<String>) -> Result<Self> {
        Ok(Self::new(PromptTemplate::from_template(system)?))
    }

    pub fn system_template(&self) -> &PromptTemplate {
        &self.system
    }

    /// Build the message list for one chat turn
    pub fn render(
        &self,
        vars: &HashMap<String, String>,
        history: &[Turn],
        input: &str,
    ) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system.format(vars)?));
        messages.extend(history.iter().map(Turn::to_message));
        messages.push(Message::user(input));
        Ok(messages)
    }
}
