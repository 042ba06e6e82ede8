//! HTTP API for the course wizard.
//!
//! The browser front-end drives the [`Workflow`] through these endpoints and
//! observes it through the WebSocket at `/ws`.
//!
//! # Endpoints
//!
//! - `GET /api/state` - Current wizard state
//! - `POST /api/course` - Submit course parameters and generate a plan
//! - `POST /api/plan/revision` - Regenerate the plan with feedback
//! - `POST /api/plan/approve` - Approve the plan and generate all content
//! - `POST /api/content/approve` - Approve the generated content
//! - `POST /api/reset` - Start over
//! - `GET /api/chat` - Chat history
//! - `POST /api/chat` - Send a chat message
//! - `GET /ws` - Event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use course_orchestrator::{create_router, AppState, Config, Credential, GeminiBackend};
//!
//! # async fn example() {
//! let config = Config::default();
//! let credential = Credential::from_env().unwrap();
//! let backend = Arc::new(GeminiBackend::new(&config.api_base_url, credential));
//!
//! let router = create_router(AppState::new(config, backend));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::backend::ModelBackend;
use crate::chat::ChatSession;
use crate::config::Config;
use crate::course::{ChatMessage, CourseInput};
use crate::error::CourseError;
use crate::generation::GenerationClient;
use crate::websocket::ws_handler;
use crate::workflow::{Workflow, WorkflowState};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/plan/revision`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevisionRequest {
    /// Free-form feedback; may be empty.
    #[serde(default)]
    pub feedback: String,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The model's reply.
    pub reply: String,
    /// The full conversation after the reply.
    pub messages: Vec<ChatMessage>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Config,
    /// The wizard.
    pub workflow: Workflow,
    /// The auxiliary chat assistant.
    pub chat: ChatSession,
}

impl AppState {
    /// Builds the wizard and the chat assistant on top of `backend`.
    #[must_use]
    pub fn new(config: Config, backend: Arc<dyn ModelBackend>) -> Self {
        let generator = GenerationClient::new(Arc::clone(&backend), config.clone());
        let chat = ChatSession::new(backend, config.chat_model.clone());
        Self {
            workflow: Workflow::new(Arc::new(generator)),
            chat,
            config,
        }
    }

    /// Assembles the state from already-built parts.
    #[must_use]
    pub const fn from_parts(config: Config, workflow: Workflow, chat: ChatSession) -> Self {
        Self {
            config,
            workflow,
            chat,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Maps a [`CourseError`] onto an HTTP status.
#[derive(Debug)]
pub struct ApiError(pub CourseError);

impl From<CourseError> for ApiError {
    fn from(error: CourseError) -> Self {
        Self(error)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            CourseError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            CourseError::InvalidStateTransition { .. }
            | CourseError::Busy
            | CourseError::StaleSession { .. } => StatusCode::CONFLICT,
            CourseError::GenerationError { .. } | CourseError::JoinFailure { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_fatal() {
            error!(status = %status, error = %self.0, "Request failed on a fatal error");
        } else if status.is_server_error() {
            warn!(
                status = %status,
                retryable = self.0.is_retryable(),
                error = %self.0,
                "Request failed"
            );
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all wizard endpoints.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, Router::new())
}

/// Creates the HTTP router and mounts `extra` alongside the `/api` routes.
///
/// Routes in `extra` are relative to `/api` and share the application state.
pub fn create_router_with(state: AppState, extra: Router<Arc<AppState>>) -> Router {
    // the front-end is served from a different origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/state", get(handle_state))
        .route("/course", post(handle_submit))
        .route("/plan/revision", post(handle_revision))
        .route("/plan/approve", post(handle_approve_plan))
        .route("/content/approve", post(handle_approve_content))
        .route("/reset", post(handle_reset))
        .route("/chat", get(handle_chat_history).post(handle_chat))
        .merge(extra);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/state`.
async fn handle_state(State(state): State<Arc<AppState>>) -> Json<WorkflowState> {
    Json(state.workflow.snapshot())
}

/// Handler for `POST /api/course`.
async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CourseInput>,
) -> ApiResult<WorkflowState> {
    info!(topic = %input.topic, "Received course input");
    Ok(Json(state.workflow.submit_input(input).await?))
}

/// Handler for `POST /api/plan/revision`.
async fn handle_revision(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RevisionRequest>,
) -> ApiResult<WorkflowState> {
    Ok(Json(state.workflow.request_revision(request.feedback).await?))
}

/// Handler for `POST /api/plan/approve`.
async fn handle_approve_plan(State(state): State<Arc<AppState>>) -> ApiResult<WorkflowState> {
    Ok(Json(state.workflow.approve_plan().await?))
}

/// Handler for `POST /api/content/approve`.
async fn handle_approve_content(State(state): State<Arc<AppState>>) -> ApiResult<WorkflowState> {
    Ok(Json(state.workflow.approve_content()?))
}

/// Handler for `POST /api/reset`.
async fn handle_reset(State(state): State<Arc<AppState>>) -> Json<WorkflowState> {
    Json(state.workflow.reset())
}

/// Handler for `GET /api/chat`.
async fn handle_chat_history(State(state): State<Arc<AppState>>) -> Json<Vec<ChatMessage>> {
    Json(state.chat.messages())
}

/// Handler for `POST /api/chat`.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let reply = state.chat.send(&request.message).await?;
    Ok(Json(ChatResponse {
        reply,
        messages: state.chat.messages(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
