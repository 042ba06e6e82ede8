//! Course Architect Export
//!
//! Turns an approved course (plan plus generated section content) into
//! standalone documents.
//!
//! # Types
//!
//! - [`ExportInput`] - The course to export
//! - [`ExportSection`] - One section with its optional content
//! - [`ExportFormat`] - Output document format
//! - [`PageLayout`] - Splits a rendered document into printable pages
//!
//! # Generators
//!
//! - [`MarkdownGenerator`] - A single Markdown document
//! - [`HtmlGenerator`] - A printable HTML document
//! - [`json::JsonGenerator`] - Compact or pretty JSON
//!
//! # Example
//!
//! ```rust
//! use course_export::{export_file_name, ExportInput, ExportSection, MarkdownGenerator};
//!
//! let course = ExportInput {
//!     title: "Python para Datos".to_string(),
//!     audience: "Analistas".to_string(),
//!     duration: "6 horas".to_string(),
//!     sections: vec![ExportSection {
//!         id: "section_1".to_string(),
//!         title: "Introducción".to_string(),
//!         content: Some("Bienvenidos.".to_string()),
//!     }],
//! };
//!
//! let markdown = MarkdownGenerator::new(&course).generate();
//! assert!(markdown.starts_with("# Python para Datos"));
//! assert_eq!(export_file_name(&course.title), "python_para_datos");
//! ```

mod html;
pub mod json;
mod markdown;

pub use html::{render_markdown, HtmlGenerator};
pub use markdown::MarkdownGenerator;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder used for sections without generated content.
pub const MISSING_CONTENT: &str = "Contenido no disponible.";

/// File name used when the course title is blank.
const FALLBACK_FILE_NAME: &str = "course";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to serialize the course to JSON.
    #[error("failed to serialize course: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write an export file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown export format requested.
    #[error("unknown export format '{0}' (expected markdown, html or json)")]
    UnknownFormat(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

// ============================================================================
// Export Input (local copy to avoid cross-crate dependency)
// ============================================================================

/// One course section as exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSection {
    /// Section id from the plan.
    pub id: String,
    /// Section title.
    pub title: String,
    /// Generated markdown body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ExportSection {
    /// The section body, or [`MISSING_CONTENT`] when absent or blank.
    #[must_use]
    pub fn content_or_placeholder(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(MISSING_CONTENT)
    }
}

/// A course ready for export.
///
/// Mirrors the plan and content map of the orchestrator without depending
/// on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInput {
    /// Course title.
    pub title: String,
    /// Target audience.
    pub audience: String,
    /// Estimated duration, as written by the model.
    pub duration: String,
    /// Sections in plan order.
    pub sections: Vec<ExportSection>,
}

impl ExportInput {
    /// Number of sections that have content.
    #[must_use]
    pub fn generated_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
            .count()
    }
}

// ============================================================================
// Export Format
// ============================================================================

/// Output document format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A single Markdown document.
    #[default]
    Markdown,
    /// A standalone printable HTML page.
    Html,
    /// The export input as JSON.
    Json,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Json => "json",
        }
    }

    /// MIME type of the document.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    /// Renders `input` in this format.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if JSON serialization fails.
    pub fn render(&self, input: &ExportInput) -> Result<String> {
        match self {
            Self::Markdown => Ok(MarkdownGenerator::new(input).generate()),
            Self::Html => Ok(HtmlGenerator::new(input).generate()),
            Self::Json => json::JsonGenerator::new(input).generate_pretty(),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Html => write!(f, "html"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Derives a file name stem from a course title.
///
/// Spaces become underscores and the result is lower-cased. A blank title
/// yields `course`.
///
/// # Examples
///
/// ```
/// use course_export::export_file_name;
///
/// assert_eq!(export_file_name("Intro a Rust"), "intro_a_rust");
/// assert_eq!(export_file_name("   "), "course");
/// ```
#[must_use]
pub fn export_file_name(title: &str) -> String {
    if title.trim().is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    title.replace(' ', "_").to_lowercase()
}

// ============================================================================
// Page Layout
// ============================================================================

/// Printable page size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Page width in points.
    pub page_width: f64,
    /// Page height in points.
    pub page_height: f64,
}

impl Default for PageLayout {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
        }
    }
}

impl PageLayout {
    /// Height of a `canvas_width` × `canvas_height` rendering once scaled to
    /// the page width.
    #[must_use]
    pub fn scaled_height(&self, canvas_width: f64, canvas_height: f64) -> f64 {
        if canvas_width <= 0.0 {
            return 0.0;
        }
        canvas_height * self.page_width / canvas_width
    }

    /// Vertical offsets at which the scaled rendering is placed on each page.
    ///
    /// The first page shows the top of the rendering at offset 0; each
    /// following page shifts it up by one page height. There is always at
    /// least one page.
    #[must_use]
    pub fn slices(&self, canvas_width: f64, canvas_height: f64) -> Vec<f64> {
        let mut remaining = self.scaled_height(canvas_width, canvas_height) - self.page_height;
        let mut offset = 0.0;
        let mut offsets = vec![offset];

        while remaining > 0.0 {
            offset -= self.page_height;
            offsets.push(offset);
            remaining -= self.page_height;
        }

        offsets
    }
}

// ============================================================================
// Tests
// ============================================================================
