//! End-to-end wizard runs over HTTP.
//!
//! The server runs with the real Gemini backend pointed at a `wiremock`
//! server that plays the Generative Language API.

use std::sync::Arc;
use std::time::Duration;

use course_export::{export_file_name, ExportInput, ExportSection, MarkdownGenerator};
use course_orchestrator::{
    create_router, AppState, Config, Credential, ErrorResponse, GeminiBackend, GenerationStep,
    WorkflowState, CONTENT_FAILED_MESSAGE,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLAN_PATH: &str = "/models/gemini-3-flash-preview:generateContent";
const CONTENT_PATH: &str = "/models/gemini-3-pro-preview:generateContent";

/// Wraps `text` in a `generateContent` response.
fn gemini_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

fn plan(title: &str, sections: &[(&str, &str)]) -> String {
    json!({
        "title": title,
        "audience": "Programadores con experiencia en Python",
        "duration": "4 horas",
        "sections": sections.iter().map(|(id, section_title)| json!({
            "id": id,
            "title": section_title,
            "description": format!("Todo sobre {section_title}"),
            "objectives": [format!("Entender {section_title}")],
            "subsections": [{"title": "Conceptos", "description": "Lo básico"}]
        })).collect::<Vec<_>>()
    })
    .to_string()
}

/// Starts the wizard server against `gemini` and returns its base URL.
async fn spawn_server(gemini: &MockServer) -> String {
    let config = Config {
        api_base_url: gemini.uri(),
        ..Config::default()
    };
    let credential = Credential::from_value(Some("test-key".to_string())).expect("credential");
    let backend = Arc::new(GeminiBackend::new(&config.api_base_url, credential));
    let router = create_router(AppState::new(config, backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{addr}")
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> reqwest::Response {
    client
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("request failed")
}

fn course_input() -> Value {
    json!({
        "topic": "Rust para programadores de Python",
        "objective": "Escribir herramientas de línea de comandos seguras",
        "audience": "Programadores con experiencia en Python"
    })
}

#[tokio::test]
async fn test_full_wizard_run() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PLAN_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({"generationConfig": {"temperature": 0.7}})))
        .respond_with(gemini_reply(&plan(
            "Rust para Pythonistas",
            &[("section_1", "Propiedad")],
        )))
        .expect(1)
        .mount(&gemini)
        .await;

    Mock::given(method("POST"))
        .and(path(PLAN_PATH))
        .and(body_partial_json(json!({"generationConfig": {"temperature": 0.8}})))
        .and(body_string_contains("Añade una sección de préstamos"))
        .respond_with(gemini_reply(&plan(
            "Rust para Pythonistas",
            &[("section_1", "Propiedad"), ("section_2", "Préstamos")],
        )))
        .expect(1)
        .mount(&gemini)
        .await;

    for (title, body) in [
        ("Propiedad", "## Movimiento\n\nCada valor tiene un dueño."),
        ("Préstamos", "## Referencias\n\n`&T` y `&mut T`."),
    ] {
        Mock::given(method("POST"))
            .and(path(CONTENT_PATH))
            .and(body_string_contains(title))
            .respond_with(gemini_reply(body))
            .expect(1)
            .mount(&gemini)
            .await;
    }

    let base = spawn_server(&gemini).await;
    let client = reqwest::Client::new();

    // CREATE -> REVIEW_PLAN
    let response = post(&client, format!("{base}/api/course"), course_input()).await;
    assert_eq!(response.status(), 200);
    let state: WorkflowState = response.json().await.expect("state");
    assert_eq!(state.step, GenerationStep::ReviewPlan);
    assert_eq!(state.plan.as_ref().map(|p| p.sections.len()), Some(1));

    // revision replaces the plan
    let response = post(
        &client,
        format!("{base}/api/plan/revision"),
        json!({"feedback": "Añade una sección de préstamos"}),
    )
    .await;
    let state: WorkflowState = response.json().await.expect("state");
    assert_eq!(state.step, GenerationStep::ReviewPlan);
    assert_eq!(state.plan.as_ref().map(|p| p.sections.len()), Some(2));

    // REVIEW_PLAN -> REVIEW_CONTENT
    let response = post(&client, format!("{base}/api/plan/approve"), json!({})).await;
    assert_eq!(response.status(), 200);
    let state: WorkflowState = response.json().await.expect("state");
    assert_eq!(state.step, GenerationStep::ReviewContent);
    assert_eq!(
        state.content_map.keys().collect::<Vec<_>>(),
        vec!["section_1", "section_2"]
    );
    assert!(state.content_map["section_2"].contains("&mut T"));

    // REVIEW_CONTENT -> COMPLETED, twice
    for _ in 0..2 {
        let response = post(&client, format!("{base}/api/content/approve"), json!({})).await;
        let state: WorkflowState = response.json().await.expect("state");
        assert_eq!(state.step, GenerationStep::Completed);
    }

    // the approved course exports cleanly
    let state: WorkflowState = client
        .get(format!("{base}/api/state"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("state");
    let plan = state.plan.expect("plan");
    let course = ExportInput {
        title: plan.title.clone(),
        audience: plan.audience.clone(),
        duration: plan.duration.clone(),
        sections: plan
            .sections
            .iter()
            .map(|s| ExportSection {
                id: s.id.clone(),
                title: s.title.clone(),
                content: state.content_map.get(&s.id).cloned(),
            })
            .collect(),
    };
    let markdown = MarkdownGenerator::new(&course).generate();
    assert!(markdown.contains("## Sección 2: Préstamos\n\n## Referencias"));
    assert_eq!(export_file_name(&course.title), "rust_para_pythonistas");

    // reset returns to the initial state
    let response = post(&client, format!("{base}/api/reset"), json!({})).await;
    let state: WorkflowState = response.json().await.expect("state");
    assert_eq!(state, WorkflowState::default());
}

#[tokio::test]
async fn test_section_failure_keeps_plan_and_reports_error() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PLAN_PATH))
        .respond_with(gemini_reply(&plan(
            "Rust",
            &[("s1", "Propiedad"), ("s2", "Préstamos"), ("s3", "Traits")],
        )))
        .mount(&gemini)
        .await;

    Mock::given(method("POST"))
        .and(path(CONTENT_PATH))
        .and(body_string_contains("Préstamos"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&gemini)
        .await;

    Mock::given(method("POST"))
        .and(path(CONTENT_PATH))
        .respond_with(gemini_reply("contenido"))
        .mount(&gemini)
        .await;

    let base = spawn_server(&gemini).await;
    let client = reqwest::Client::new();

    post(&client, format!("{base}/api/course"), course_input()).await;
    let response = post(&client, format!("{base}/api/plan/approve"), json!({})).await;

    assert_eq!(response.status(), 502);
    let error: ErrorResponse = response.json().await.expect("error body");
    assert!(error.error.contains("1 of 3 sections"));

    let state: WorkflowState = client
        .get(format!("{base}/api/state"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("state");
    assert_eq!(state.step, GenerationStep::ReviewPlan);
    assert!(state.content_map.is_empty());
    assert_eq!(state.error.as_deref(), Some(CONTENT_FAILED_MESSAGE));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_malformed_plan_returns_to_create() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PLAN_PATH))
        .respond_with(gemini_reply("Claro, aquí tienes tu plan: ..."))
        .expect(1)
        .mount(&gemini)
        .await;

    let base = spawn_server(&gemini).await;
    let client = reqwest::Client::new();

    let response = post(&client, format!("{base}/api/course"), course_input()).await;
    assert_eq!(response.status(), 502);

    let state: WorkflowState = client
        .get(format!("{base}/api/state"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("state");
    assert_eq!(state.step, GenerationStep::Create);
    assert!(state.input.is_none());
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_backend() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(gemini_reply("{}"))
        .expect(0)
        .mount(&gemini)
        .await;

    let base = spawn_server(&gemini).await;
    let client = reqwest::Client::new();

    let response = post(
        &client,
        format!("{base}/api/course"),
        json!({"topic": "Rust", "objective": "", "audience": "Todos"}),
    )
    .await;
    assert_eq!(response.status(), 400);
}
