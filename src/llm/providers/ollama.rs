// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ollama local model provider implementation
//!
//! Implements the LlmProvider trait against Ollama's /api/chat endpoint.
//! Streaming responses arrive as NDJSON, one object per line.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ApiError, ChainsmithError, Result};
use crate::llm::message::{Message, Role};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, EventStream, LlmProvider, StopReason, StreamEvent,
    Usage,
};
use crate::rag::Embedder;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const NOT_RUNNING_HINT: &str = "Ollama is not running. Start the Ollama app or run 'ollama serve'";

/// Ollama local model provider
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default base URL (http://localhost:11434)
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create with a custom base URL and a per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List models that have been pulled locally
    pub async fn list_local_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(ChainsmithError::Api(ApiError::ServerError {
                status: response.status().as_u16(),
                message: "Failed to list models".to_string(),
            }));
        }

        let body: OllamaTagsResponse = response.json().await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    fn map_send_error(e: reqwest::Error) -> ChainsmithError {
        if e.is_connect() {
            ChainsmithError::Api(ApiError::Network(NOT_RUNNING_HINT.to_string()))
        } else if e.is_timeout() {
            ChainsmithError::Api(ApiError::Timeout)
        } else {
            ChainsmithError::Http(e)
        }
    }

    /// Convert internal messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Build the request body
    fn build_request(request: &CompletionRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages),
            stream,
            options: OllamaOptions {
                temperature: Some(request.temperature),
                num_predict: Some(request.max_tokens as i64),
                num_thread: request.num_threads,
            },
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str) -> ChainsmithError {
        if let Ok(error_response) = serde_json::from_str::<OllamaError>(body) {
            let message = error_response.error;
            if message.contains("model") && message.contains("not found") {
                ChainsmithError::Api(ApiError::ModelNotFound(message))
            } else {
                ChainsmithError::Api(ApiError::ServerError { status, message })
            }
        } else {
            ChainsmithError::Api(ApiError::ServerError {
                status,
                message: body.to_string(),
            })
        }
    }

    fn stop_reason(done_reason: Option<&str>) -> StopReason {
        match done_reason {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }

    fn usage(prompt_eval_count: Option<i64>, eval_count: Option<i64>) -> Usage {
        Usage {
            input_tokens: prompt_eval_count.unwrap_or(0) as u32,
            output_tokens: eval_count.unwrap_or(0) as u32,
        }
    }

    /// Append `bytes` to `buffer` and turn every complete line into events
    ///
    /// Lines are decoded only once their newline has arrived, so a
    /// multi-byte character split across network chunks stays intact.
    fn drain_lines(buffer: &mut Vec<u8>, bytes: &[u8]) -> Vec<Result<StreamEvent>> {
        buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            match std::str::from_utf8(&line) {
                Ok(line) => events.extend(Self::events_for_line(line)),
                Err(e) => events.push(Err(ChainsmithError::Api(ApiError::StreamError(
                    format!("invalid UTF-8 in stream: {}", e),
                )))),
            }
        }
        events
    }

    /// Turn one NDJSON line into stream events
    fn events_for_line(line: &str) -> Vec<Result<StreamEvent>> {
        if line.trim().is_empty() {
            return Vec::new();
        }

        let chunk: OllamaResponse = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(_) => {
                // Errors mid-stream arrive as {"error": "..."}
                if let Ok(error) = serde_json::from_str::<OllamaError>(line) {
                    return vec![Err(ChainsmithError::Api(ApiError::StreamError(
                        error.error,
                    )))];
                }
                tracing::warn!(line, "skipping unparseable stream line");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        if !chunk.message.content.is_empty() {
            events.push(Ok(StreamEvent::TextDelta(chunk.message.content)));
        }
        if chunk.done {
            events.push(Ok(StreamEvent::Done {
                stop_reason: Some(Self::stop_reason(chunk.done_reason.as_deref())),
                usage: Self::usage(chunk.prompt_eval_count, chunk.eval_count),
            }));
        }
        events
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::build_request(&request, false);

        tracing::debug!(model = %request.model, messages = body.messages.len(), "ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ChainsmithError::Api(ApiError::InvalidResponse(e.to_string())))?;

        Ok(CompletionResponse {
            id: format!("ollama-{}", uuid::Uuid::new_v4()),
            model: request.model,
            text: api_response.message.content,
            stop_reason: api_response
                .done
                .then(|| Self::stop_reason(api_response.done_reason.as_deref())),
            usage: Self::usage(api_response.prompt_eval_count, api_response.eval_count),
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::build_request(&request, true);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        // Bytes can split a line anywhere, so buffer until a newline arrives
        let event_stream = response
            .bytes_stream()
            .map(|result| {
                result.map_err(|e| ChainsmithError::Api(ApiError::StreamError(e.to_string())))
            })
            .scan(Vec::new(), |buffer: &mut Vec<u8>, result| {
                let events = match result {
                    Ok(bytes) => Self::drain_lines(buffer, &bytes),
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = OllamaEmbedRequest {
            model,
            input: inputs,
        };

        tracing::debug!(model, inputs = inputs.len(), "ollama embed request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| ChainsmithError::Api(ApiError::InvalidResponse(e.to_string())))?;

        if parsed.embeddings.len() != inputs.len() {
            return Err(ChainsmithError::Api(ApiError::InvalidResponse(format!(
                "asked for {} embeddings, got {}",
                inputs.len(),
                parsed.embeddings.len()
            ))));
        }
        Ok(parsed.embeddings)
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_thread: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<i64>,
    #[serde(default)]
    eval_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::collect_stream;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            "mistral:latest",
            vec![Message::system("be brief"), Message::user("hello")],
        )
        .with_num_threads(Some(8))
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OllamaProvider::with_base_url("http://localhost:11434/");
        assert_eq!(provider.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_build_request_puts_system_first() {
        let body = OllamaProvider::build_request(&request(), false);

        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "be brief");
        assert_eq!(body.messages[1].role, "user");
        assert!(!body.stream);
    }

    #[test]
    fn test_build_request_options() {
        let json = serde_json::to_value(OllamaProvider::build_request(&request(), true)).unwrap();

        assert_eq!(json["options"]["num_thread"], 8);
        assert_eq!(json["options"]["num_predict"], 2048);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_build_request_omits_unset_threads() {
        let request = CompletionRequest::new("m", vec![Message::user("x")]);
        let json = serde_json::to_value(OllamaProvider::build_request(&request, false)).unwrap();

        assert!(json["options"].get("num_thread").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_error_model_not_found() {
        let err = OllamaProvider::parse_error(404, r#"{"error":"model 'foo' not found"}"#);
        assert!(matches!(
            err,
            ChainsmithError::Api(ApiError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_parse_error_plain_body() {
        let err = OllamaProvider::parse_error(502, "bad gateway");
        match err {
            ChainsmithError::Api(ApiError::ServerError { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("Expected ServerError, got {:?}", other),
        }
    }

    #[test]
    fn test_events_for_line_delta_and_done() {
        let events = OllamaProvider::events_for_line(
            r#"{"message":{"role":"assistant","content":"!"},"done":true,"done_reason":"length","prompt_eval_count":3,"eval_count":4}"#,
        );

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta("!".to_string())
        );
        assert_eq!(
            events[1].as_ref().unwrap(),
            &StreamEvent::Done {
                stop_reason: Some(StopReason::MaxTokens),
                usage: Usage {
                    input_tokens: 3,
                    output_tokens: 4
                },
            }
        );
    }

    #[test]
    fn test_events_for_line_error_object() {
        let events = OllamaProvider::events_for_line(r#"{"error":"out of memory"}"#);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ChainsmithError::Api(ApiError::StreamError(_)))
        ));
    }

    #[test]
    fn test_events_for_blank_line() {
        assert!(OllamaProvider::events_for_line("   \n").is_empty());
    }

    #[tokio::test]
    async fn test_complete_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "mistral:latest",
                "stream": false,
                "options": {"num_thread": 8}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "mistral:latest",
                "message": {"role": "assistant", "content": "def f(): return [1, 2, 3]"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 12,
                "eval_count": 9
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let response = provider.complete(request()).await.unwrap();

        assert_eq!(response.text, "def f(): return [1, 2, 3]");
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.usage.total_tokens(), 21);
    }

    #[tokio::test]
    async fn test_complete_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error":"model \"nope\" not found, try pulling it first"}"#),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let err = provider.complete(request()).await.unwrap_err();

        assert!(matches!(
            err,
            ChainsmithError::Api(ApiError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_stream_against_server() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"При"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"вет"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","eval_count":2}"#,
            "\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let stream = provider.complete_stream(request()).await.unwrap();
        let text = collect_stream(stream, |_| {}).await.unwrap();

        assert_eq!(text, "Привет");
    }

    #[test]
    fn test_drain_lines_keeps_split_character_intact() {
        let line = "{\"message\":{\"role\":\"assistant\",\"content\":\"Привет\"},\"done\":false}\n";
        let split = line.find('П').unwrap() + 1;
        let (first, second) = line.as_bytes().split_at(split);

        let mut buffer = Vec::new();
        assert!(OllamaProvider::drain_lines(&mut buffer, first).is_empty());
        let events = OllamaProvider::drain_lines(&mut buffer, second);

        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta("Привет".to_string())
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_lines_invalid_utf8_is_stream_error() {
        let mut buffer = Vec::new();
        let events = OllamaProvider::drain_lines(&mut buffer, b"{\"x\":\"\xff\"}\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Err(ChainsmithError::Api(ApiError::StreamError(_)))
        ));
    }

    /// Serve one chunked response whose first chunk ends inside a
    /// multi-byte character
    async fn serve_split_chunks(body: &'static str, split: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the whole request before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let (first, second) = body.as_bytes().split_at(split);
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            for part in [first, second] {
                socket
                    .write_all(format!("{:x}\r\n", part.len()).as_bytes())
                    .await
                    .unwrap();
                socket.write_all(part).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_stream_split_inside_cyrillic_character() {
        const BODY: &str = "{\"message\":{\"role\":\"assistant\",\"content\":\"Привет\"},\"done\":false}\n{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\"}\n";
        let split = BODY.find('П').unwrap() + 1;
        let url = serve_split_chunks(BODY, split).await;

        let provider = OllamaProvider::with_base_url(url);
        let stream = provider.complete_stream(request()).await.unwrap();
        let text = collect_stream(stream, |_| {}).await.unwrap();

        assert_eq!(text, "Привет");
    }

    #[tokio::test]
    async fn test_embed_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({
                "model": "all-minilm:latest",
                "input": ["first chunk", "second chunk"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "all-minilm:latest",
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let vectors = provider
            .embed(
                "all-minilm:latest",
                &["first chunk".to_string(), "second chunk".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let err = provider
            .embed("m", &["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChainsmithError::Api(ApiError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_nothing_skips_request() {
        // No server behind this address; an empty batch must not reach it
        let provider = OllamaProvider::with_base_url("http://127.0.0.1:9");
        assert!(provider.embed("m", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_local_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "mistral:latest"}, {"name": "llama3:8b"}]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        assert_eq!(
            provider.list_local_models().await.unwrap(),
            vec!["mistral:latest", "llama3:8b"]
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is not expected to have an HTTP listener
        let provider = OllamaProvider::with_base_url("http://127.0.0.1:9");
        let err = provider.complete(request()).await.unwrap_err();

        assert!(matches!(err, ChainsmithError::Api(ApiError::Network(_))));
    }
}
