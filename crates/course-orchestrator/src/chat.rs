//! Auxiliary chat assistant.
//!
//! Independent of the wizard: it shares the model backend but never reads
//! or writes [`WorkflowState`](crate::WorkflowState).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::backend::{ModelBackend, ModelRequest};
use crate::course::ChatMessage;
use crate::error::{CourseError, Result};

/// System instruction given to the chat model.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful AI assistant for the Gemini Course Architect application. You can answer questions about course creation, technology, and learning design.";

/// Model message appended when a reply could not be produced.
pub const CHAT_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Default)]
struct Transcript {
    /// Everything shown to the user, apologies included.
    messages: Vec<ChatMessage>,
    /// Completed exchanges sent back to the model as context.
    context: Vec<ChatMessage>,
    pending: bool,
}

fn lock(transcript: &Mutex<Transcript>) -> MutexGuard<'_, Transcript> {
    transcript.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the pending flag if a send is dropped mid-flight.
struct PendingGuard<'a>(&'a Mutex<Transcript>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).pending = false;
    }
}

/// A single chat conversation with an append-only history.
pub struct ChatSession {
    backend: Arc<dyn ModelBackend>,
    model: String,
    transcript: Mutex<Transcript>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("model", &self.model)
            .field("messages", &lock(&self.transcript).messages.len())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Creates an empty conversation against `model`.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            transcript: Mutex::new(Transcript::default()),
        }
    }

    /// The conversation so far.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.transcript).messages.clone()
    }

    /// Sends `text` and returns the model's reply.
    ///
    /// On failure the apology [`CHAT_ERROR_MESSAGE`] is appended to the
    /// history and the error is returned.
    pub async fn send(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(CourseError::validation("message"));
        }

        let request = {
            let mut transcript = lock(&self.transcript);
            if transcript.pending {
                return Err(CourseError::Busy);
            }
            transcript.pending = true;

            let message = ChatMessage::user(text);
            transcript.messages.push(message.clone());

            let mut contents = transcript.context.clone();
            contents.push(message);
            ModelRequest::conversation(&self.model, contents)
                .with_system_instruction(CHAT_SYSTEM_INSTRUCTION)
        };
        let _pending = PendingGuard(&self.transcript);

        debug!(turns = request.contents.len(), "Sending chat message");
        let result = self.backend.generate(request).await;

        let mut transcript = lock(&self.transcript);
        match result {
            Ok(response) => {
                let reply = ChatMessage::model(response.text.clone());
                transcript.context.push(ChatMessage::user(text));
                transcript.context.push(reply.clone());
                transcript.messages.push(reply);
                Ok(response.text)
            }
            Err(e) => {
                warn!(error = %e, "Chat reply failed");
                transcript.messages.push(ChatMessage::model(CHAT_ERROR_MESSAGE));
                Err(e)
            }
        }
    }
}
