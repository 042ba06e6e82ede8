//! Integration tests for the WebSocket event stream.
//!
//! A real server is started on an ephemeral port; wizard transitions are
//! driven over HTTP and observed through `/ws`.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use course_orchestrator::{
    create_router, AppState, Config, Credential, GeminiBackend, GenerationStep, WorkflowEvent,
};
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// A Gemini stand-in that returns a one-section plan.
async fn gemini() -> MockServer {
    let server = MockServer::start().await;
    let plan = json!({
        "title": "Rust",
        "audience": "Programadores",
        "duration": "2 horas",
        "sections": [{
            "id": "section_1", "title": "Propiedad", "description": "d",
            "objectives": ["o"], "subsections": []
        }]
    });

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-flash-preview:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": plan.to_string()}]}}]
        })))
        .mount(&server)
        .await;

    server
}

/// Spawns the test server and returns its HTTP and WebSocket base URLs.
async fn spawn_test_server(gemini: &MockServer) -> (String, String) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let config = Config {
        api_base_url: gemini.uri(),
        ..Config::default()
    };
    let credential = Credential::from_value(Some("test-key".to_string())).expect("credential");
    let backend = Arc::new(GeminiBackend::new(&config.api_base_url, credential));
    let router = create_router(AppState::new(config, backend));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), format!("ws://{addr}/ws"))
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next event, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> WorkflowEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            other => panic!("Unexpected message: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let gemini = gemini().await;
    let (_, ws_url) = spawn_test_server(&gemini).await;

    let mut client = connect_client(&ws_url).await;
    let event = receive_event(&mut client).await;

    let WorkflowEvent::Connected(payload) = event else {
        panic!("Expected connected event, got {event:?}");
    };
    assert_eq!(payload.state.step, GenerationStep::Create);
    assert_eq!(payload.session, 0);
}

#[tokio::test]
async fn test_submit_broadcasts_transitions_to_all_clients() {
    let gemini = gemini().await;
    let (base, ws_url) = spawn_test_server(&gemini).await;

    let mut first = connect_client(&ws_url).await;
    let mut second = connect_client(&ws_url).await;
    receive_event(&mut first).await;
    receive_event(&mut second).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/course"))
        .json(&json!({"topic": "Rust", "objective": "Ownership", "audience": "Devs"}))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 200);

    for client in [&mut first, &mut second] {
        let WorkflowEvent::StepChanged(started) = receive_event(client).await else {
            panic!("Expected step_changed");
        };
        assert_eq!(started.from, GenerationStep::Create);
        assert_eq!(started.to, GenerationStep::GeneratingPlan);
        assert_eq!(started.session, 1);

        let WorkflowEvent::PlanReady(plan) = receive_event(client).await else {
            panic!("Expected plan_ready");
        };
        assert_eq!(plan.title, "Rust");
        assert_eq!(plan.sections, 1);

        let WorkflowEvent::StepChanged(finished) = receive_event(client).await else {
            panic!("Expected step_changed");
        };
        assert_eq!(finished.to, GenerationStep::ReviewPlan);
    }
}

#[tokio::test]
async fn test_reset_is_broadcast() {
    let gemini = gemini().await;
    let (base, ws_url) = spawn_test_server(&gemini).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    reqwest::Client::new()
        .post(format!("{base}/api/reset"))
        .send()
        .await
        .expect("request failed");

    assert_eq!(receive_event(&mut client).await, WorkflowEvent::reset(1));
}

#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let gemini = gemini().await;
    let (_, ws_url) = spawn_test_server(&gemini).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;
    client.close(None).await.expect("Failed to close");

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client = connect_client(&ws_url).await;
    let event = receive_event(&mut client).await;
    assert_eq!(event.event_name(), "connected");
}
