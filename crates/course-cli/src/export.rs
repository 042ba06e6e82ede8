//! `GET /api/export` - download the approved course as a document.

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use course_export::{export_file_name, ExportFormat, ExportInput, ExportSection};
use course_orchestrator::{AppState, ErrorResponse, GenerationStep, WorkflowState};
use serde::Deserialize;
use tracing::info;

/// Query string of the export endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// `markdown` (default), `html` or `json`.
    pub format: Option<String>,
}

/// Routes mounted under `/api` next to the wizard endpoints.
pub fn export_routes() -> Router<Arc<AppState>> {
    Router::new().route("/export", get(handle_export))
}

/// Builds the export document input from the wizard state.
///
/// Returns `None` unless the content has been generated.
pub fn export_input(state: &WorkflowState) -> Option<ExportInput> {
    if !matches!(
        state.step,
        GenerationStep::ReviewContent | GenerationStep::Completed
    ) {
        return None;
    }
    let plan = state.plan.as_ref()?;

    Some(ExportInput {
        title: plan.title.clone(),
        audience: plan.audience.clone(),
        duration: plan.duration.clone(),
        sections: plan
            .sections
            .iter()
            .map(|section| ExportSection {
                id: section.id.clone(),
                title: section.title.clone(),
                content: state.content_map.get(&section.id).cloned(),
            })
            .collect(),
    })
}

/// `Content-Disposition` value for `stem.extension`.
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
pub fn content_disposition(stem: &str, extension: &str) -> String {
    let fallback: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == stem {
        return format!("attachment; filename=\"{stem}.{extension}\"");
    }

    let mut encoded = String::new();
    for byte in stem.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    format!(
        "attachment; filename=\"{fallback}.{extension}\"; filename*=UTF-8''{encoded}.{extension}"
    )
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn handle_export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let format = match query.format.as_deref().map(str::parse::<ExportFormat>) {
        None => ExportFormat::default(),
        Some(Ok(format)) => format,
        Some(Err(e)) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let snapshot = state.workflow.snapshot();
    let Some(input) = export_input(&snapshot) else {
        return error(
            StatusCode::CONFLICT,
            format!("Nothing to export while in {}", snapshot.step),
        );
    };

    let body = match format.render(&input) {
        Ok(body) => body,
        Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let stem = export_file_name(&input.title);
    info!(
        format = %format,
        file = %stem,
        sections = input.sections.len(),
        generated = input.generated_count(),
        "Exporting course"
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&stem, format.extension()),
            ),
        ],
        body,
    )
        .into_response()
}
