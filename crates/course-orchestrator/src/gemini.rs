//! Gemini implementation of [`ModelBackend`].
//!
//! Talks to the Generative Language REST API:
//! `POST {base}/models/{model}:generateContent` with the key in the
//! `x-goog-api-key` header. Structured output is requested through
//! `generationConfig.responseMimeType` and `generationConfig.responseSchema`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse};
use crate::config::Credential;
use crate::course::{ChatMessage, ChatRole};
use crate::error::{CourseError, GenerationErrorKind, Result};

/// Maximum number of response body bytes echoed into error messages.
const MAX_ERROR_BODY: usize = 500;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

const fn wire_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    }
}

fn build_body(request: &ModelRequest) -> GenerateRequest<'_> {
    let contents = request
        .contents
        .iter()
        .map(|ChatMessage { role, content }| Content {
            role: wire_role(*role),
            parts: vec![Part { text: content }],
        })
        .collect();

    let system_instruction = request
        .system_instruction
        .as_deref()
        .map(|text| SystemInstruction {
            parts: vec![Part { text }],
        });

    let generation_config = (request.temperature.is_some() || request.schema.is_some()).then(|| {
        GenerationConfig {
            temperature: request.temperature,
            response_mime_type: request.schema.as_ref().map(|_| "application/json"),
            response_schema: request.schema.as_ref(),
        }
    });

    GenerateRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

// ============================================================================
// GeminiBackend
// ============================================================================

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl GeminiBackend {
    /// Creates a backend for the given API base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse> {
        let url = self.endpoint(&request.model);
        let body = build_body(&request);

        debug!(
            model = %request.model,
            turns = request.contents.len(),
            structured = request.schema.is_some(),
            temperature = ?request.temperature,
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| CourseError::generation(GenerationErrorKind::Network, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CourseError::generation(GenerationErrorKind::Network, e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), model = %request.model, "Model backend returned an error");
            return Err(CourseError::generation(
                GenerationErrorKind::from_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), truncate(&text)),
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            CourseError::malformed(format!(
                "unreadable generateContent response: {e}. Body: {}",
                truncate(&text)
            ))
        })?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(CourseError::generation(
                GenerationErrorKind::Blocked,
                format!("prompt blocked: {reason}"),
            ));
        }

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Err(CourseError::malformed("response contained no candidates"));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
            let kind = if matches!(reason, "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") {
                GenerationErrorKind::Blocked
            } else {
                GenerationErrorKind::MalformedResponse
            };
            return Err(CourseError::generation(
                kind,
                format!("empty response (finish reason: {reason})"),
            ));
        }

        Ok(ModelResponse { text })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend(server: &MockServer) -> GeminiBackend {
        GeminiBackend::new(
            server.uri(),
            Credential::from_value(Some("test-key".to_string())).unwrap(),
        )
    }

    fn text_response(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_body_for_structured_request() {
        let request = ModelRequest::prompt("m", "Plan a course")
            .with_schema(json!({"type": "OBJECT"}))
            .with_temperature(0.7);
        let body = serde_json::to_value(build_body(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Plan a course");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_body_for_free_text_request() {
        let request = ModelRequest::prompt("m", "Write").with_temperature(0.6);
        let body = serde_json::to_value(build_body(&request)).unwrap();

        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body["generationConfig"].get("responseSchema").is_none());

        let bare = serde_json::to_value(build_body(&ModelRequest::prompt("m", "x"))).unwrap();
        assert!(bare.get("generationConfig").is_none());
    }

    #[test]
    fn test_body_for_conversation() {
        let request = ModelRequest::conversation(
            "m",
            vec![ChatMessage::user("Hi"), ChatMessage::model("Hello"), ChatMessage::user("Help")],
        )
        .with_system_instruction("Be helpful");
        let body = serde_json::to_value(build_body(&request)).unwrap();

        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be helpful");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(&body);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(body.starts_with(cut));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({"generationConfig": {"temperature": 0.6}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("## Hola")))
            .expect(1)
            .mount(&server)
            .await;

        let response = backend(&server)
            .generate(ModelRequest::prompt("gemini-test", "Write").with_temperature(0.6))
            .await
            .unwrap();

        assert_eq!(response.text, "## Hola");
    }

    #[tokio::test]
    async fn test_generate_joins_multiple_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
            })))
            .mount(&server)
            .await;

        let response = backend(&server)
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap();
        assert_eq!(response.text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_generate_classifies_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap_err();

        match err {
            CourseError::GenerationError { kind, message } => {
                assert_eq!(kind, GenerationErrorKind::RateLimit);
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourseError::GenerationError {
                kind: GenerationErrorKind::Blocked,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generate_empty_candidate_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "MAX_TOKENS"}]
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[tokio::test]
    async fn test_generate_unreadable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourseError::GenerationError {
                kind: GenerationErrorKind::MalformedResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generate_network_error() {
        let backend = GeminiBackend::new(
            "http://127.0.0.1:1",
            Credential::from_value(Some("k".to_string())).unwrap(),
        );
        let err = backend
            .generate(ModelRequest::prompt("m", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourseError::GenerationError {
                kind: GenerationErrorKind::Network,
                ..
            }
        ));
    }
}
