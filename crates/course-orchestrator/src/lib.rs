//! Course Architect Orchestrator
//!
//! Drives the course wizard: plan generation, revision, concurrent section
//! content generation, approval and reset, plus the HTTP API, WebSocket
//! events and the auxiliary chat assistant.

pub mod api;
pub mod backend;
pub mod chat;
pub mod config;
pub mod course;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod prompt;
pub mod websocket;
pub mod workflow;

pub use api::{
    create_router, create_router_with, ApiError, AppState, ChatRequest, ChatResponse,
    ErrorResponse, RevisionRequest,
};
pub use backend::{ModelBackend, ModelRequest, ModelResponse};
pub use chat::{ChatSession, CHAT_ERROR_MESSAGE, CHAT_SYSTEM_INSTRUCTION};
pub use config::{Config, Credential, CONFIG_FILE_NAME, CREDENTIAL_ENV_VAR};
pub use course::{
    ChatMessage, ChatRole, CourseContentMap, CourseInput, CoursePlan, CourseSection, SubSection,
};
pub use error::{CourseError, GenerationErrorKind, Result};
pub use gemini::GeminiBackend;
pub use generation::{parse_plan, CourseGenerator, GenerationClient};
pub use websocket::{EventBroadcaster, WorkflowEvent};
pub use workflow::{
    generate_all_sections, GenerationStep, Workflow, WorkflowState, CONTENT_FAILED_MESSAGE,
    INTERRUPTED_MESSAGE, PLAN_FAILED_MESSAGE, REVISION_FAILED_MESSAGE,
};
