//! WebSocket event types and broadcasting for observing the wizard.
//!
//! Every state change of the [`Workflow`](crate::Workflow) is published as a
//! [`WorkflowEvent`]. Connected clients receive the events as JSON objects
//! with `event` and `payload` fields.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes current state
//! - `step_changed` - The wizard moved between steps
//! - `plan_ready` - A plan was generated or revised
//! - `content_ready` - All section contents were generated
//! - `generation_failed` - A remote call failed or was abandoned
//! - `reset` - The session was discarded
//!
//! # Example
//!
//! ```no_run
//! use course_orchestrator::websocket::{EventBroadcaster, WorkflowEvent};
//! use course_orchestrator::{GenerationStep, WorkflowState};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(WorkflowEvent::connected(WorkflowState::default(), 0));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::course::{CourseContentMap, CoursePlan};
use crate::workflow::{GenerationStep, WorkflowState};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The current wizard state.
    pub state: WorkflowState,
    /// The current session id.
    pub session: u64,
}

/// Payload for the `step_changed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepChangedPayload {
    /// Step before the transition.
    pub from: GenerationStep,
    /// Step after the transition.
    pub to: GenerationStep,
    /// Session the transition belongs to.
    pub session: u64,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `plan_ready` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReadyPayload {
    /// Plan title.
    pub title: String,
    /// Number of sections in the plan.
    pub sections: usize,
}

/// Payload for the `content_ready` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReadyPayload {
    /// Number of generated sections.
    pub sections: usize,
}

/// Payload for the `generation_failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailedPayload {
    /// Step the failure happened in.
    pub step: GenerationStep,
    /// User-facing message.
    pub message: String,
}

/// Payload for the `reset` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPayload {
    /// The new session id.
    pub session: u64,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Wizard events.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent on every step change, including reverts after a failure.
    StepChanged(StepChangedPayload),
    /// Sent when a new or revised plan is available.
    PlanReady(PlanReadyPayload),
    /// Sent when every section has content.
    ContentReady(ContentReadyPayload),
    /// Sent when a generation call failed or was abandoned.
    GenerationFailed(GenerationFailedPayload),
    /// Sent when the wizard is reset.
    Reset(ResetPayload),
}

impl WorkflowEvent {
    /// Creates a `Connected` event with the current state.
    #[must_use]
    pub const fn connected(state: WorkflowState, session: u64) -> Self {
        Self::Connected(ConnectedPayload { state, session })
    }

    /// Creates a `StepChanged` event stamped with the current time.
    #[must_use]
    pub fn step_changed(from: GenerationStep, to: GenerationStep, session: u64) -> Self {
        Self::StepChanged(StepChangedPayload {
            from,
            to,
            session,
            timestamp: Utc::now(),
        })
    }

    /// Creates a `PlanReady` event summarizing `plan`.
    #[must_use]
    pub fn plan_ready(plan: &CoursePlan) -> Self {
        Self::PlanReady(PlanReadyPayload {
            title: plan.title.clone(),
            sections: plan.sections.len(),
        })
    }

    /// Creates a `ContentReady` event summarizing `content`.
    #[must_use]
    pub fn content_ready(content: &CourseContentMap) -> Self {
        Self::ContentReady(ContentReadyPayload {
            sections: content.len(),
        })
    }

    /// Creates a `GenerationFailed` event.
    #[must_use]
    pub fn generation_failed(step: GenerationStep, message: impl Into<String>) -> Self {
        Self::GenerationFailed(GenerationFailedPayload {
            step,
            message: message.into(),
        })
    }

    /// Creates a `Reset` event.
    #[must_use]
    pub const fn reset(session: u64) -> Self {
        Self::Reset(ResetPayload { session })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::StepChanged(_) => "step_changed",
            Self::PlanReady(_) => "plan_ready",
            Self::ContentReady(_) => "content_ready",
            Self::GenerationFailed(_) => "generation_failed",
            Self::Reset(_) => "reset",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts workflow events to all subscribers.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event and returns the number of receivers.
    pub fn send(&self, event: WorkflowEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Seconds between heartbeat pings.
const HEARTBEAT_SECS: u64 = 30;

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler mounted at `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serves one client: initial state, then every broadcast event, with
/// heartbeat pings.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // subscribe before the snapshot so no transition slips between them
    let mut event_receiver = state.workflow.events().subscribe();
    let (snapshot, session) = state.workflow.snapshot_with_session();
    let connected = WorkflowEvent::connected(snapshot, session);

    let connected_json = match serde_json::to_string(&connected) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent initial state");

    let mut heartbeat_interval = interval(Duration::from_secs(HEARTBEAT_SECS));
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(workflow_event) => {
                        let json = match serde_json::to_string(&workflow_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
