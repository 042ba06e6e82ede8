//! Request/response contract with the hosted model.
//!
//! [`ModelBackend`] is the seam between the generation client and the
//! network. The production implementation is [`crate::gemini::GeminiBackend`].

use async_trait::async_trait;
use serde_json::Value;

use crate::course::ChatMessage;
use crate::error::Result;

/// A single call to the hosted model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model selector, e.g. `gemini-3-flash-preview`.
    pub model: String,
    /// Conversation turns; single-prompt calls carry one user message.
    pub contents: Vec<ChatMessage>,
    /// Optional system instruction.
    pub system_instruction: Option<String>,
    /// JSON schema the response must conform to; enables structured output.
    pub schema: Option<Value>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ModelRequest {
    /// Creates a single-prompt request.
    #[must_use]
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            contents: vec![ChatMessage::user(prompt)],
            system_instruction: None,
            schema: None,
            temperature: None,
        }
    }

    /// Creates a multi-turn request.
    #[must_use]
    pub fn conversation(model: impl Into<String>, contents: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            contents,
            system_instruction: None,
            schema: None,
            temperature: None,
        }
    }

    /// Requests structured JSON output matching `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// The model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    /// Concatenated text of the first candidate.
    pub text: String,
}

/// A hosted model that turns a [`ModelRequest`] into text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Issues one request. Implementations do not retry.
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse>;
}
