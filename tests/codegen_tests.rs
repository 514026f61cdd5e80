// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use chainsmith::chain::CodegenPipeline;
use chainsmith::config::Settings;
use chainsmith::error::ChainsmithError;
use chainsmith::llm::providers::OllamaProvider;
use serde_json::Value;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(model: &str, text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "model": model,
        "message": {"role": "assistant", "content": text},
        "done": true,
        "done_reason": "stop"
    }))
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.resilience.max_retries = 0;
    settings
}

#[tokio::test]
async fn test_code_then_test_against_ollama() {
    let server = MockServer::start().await;
    let settings = settings();

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(
            serde_json::json!({"model": settings.models.code}),
        ))
        .respond_with(reply(&settings.models.code, "def numbers():\n    return [1, 2, 3]\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(
            serde_json::json!({"model": settings.models.test}),
        ))
        .respond_with(reply(
            &settings.models.test,
            "```python\nassert numbers() == [1, 2, 3]\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(OllamaProvider::with_base_url(server.uri()));
    let pipeline = CodegenPipeline::from_settings(provider, &settings).unwrap();
    let output = pipeline
        .run("python", "return a list of numbers")
        .await
        .unwrap();

    assert_eq!(output.code, "def numbers():\n    return [1, 2, 3]");
    assert!(output.test.starts_with("```python"));

    let requests = server.received_requests().await.unwrap_or_default();
    let test_body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let test_prompt = test_body["messages"][0]["content"].as_str().unwrap();
    assert!(test_prompt.starts_with("Write a test for the following python language code:\n"));
    assert!(test_prompt.contains("def numbers():"));
}

#[tokio::test]
async fn test_missing_model_reported_with_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(r#"{"error":"model \"mistral:latest\" not found, try pulling it first"}"#),
        )
        .mount(&server)
        .await;

    let provider = Arc::new(OllamaProvider::with_base_url(server.uri()));
    let pipeline = CodegenPipeline::from_settings(provider, &settings()).unwrap();
    let err = pipeline.run("python", "anything").await.unwrap_err();

    match err {
        ChainsmithError::Chain { stage, message } => {
            assert_eq!(stage, "code_model");
            assert!(message.contains("not found"));
        }
        other => panic!("Expected Chain error, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}
