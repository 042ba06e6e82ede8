//! Printable HTML export.
//!
//! Produces a standalone document in Spanish with an embedded print
//! stylesheet. Section bodies are rendered from Markdown; raw HTML inside
//! them is shown as text rather than interpreted.

use std::fmt::Write;

use pulldown_cmark::{html, Event, Options, Parser};

use crate::{ExportInput, ExportSection};

/// Stylesheet embedded in every exported document.
const STYLES: &str = r"
        body { font-family: Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; }
        h1, h2, h3, h4, h5, h6 { color: #000; margin-top: 1.2em; margin-bottom: 0.5em; }
        h1 { font-size: 28px; border-bottom: 2px solid #eaeaea; padding-bottom: 10px; margin-bottom: 20px; }
        h2 { font-size: 22px; margin-top: 30px; border-bottom: 1px solid #eaeaea; }
        h3 { font-size: 18px; }
        p { margin-bottom: 12px; }
        ul, ol { padding-left: 25px; margin-bottom: 12px; }
        li { margin-bottom: 5px; }
        code { background-color: #f0f0f0; padding: 2px 5px; border-radius: 4px; font-family: 'Courier New', Courier, monospace; font-size: 0.9em;}
        pre { background-color: #f0f0f0; padding: 12px; border-radius: 5px; white-space: pre-wrap; word-wrap: break-word; }
        pre code { background-color: transparent; padding: 0; }
        blockquote { border-left: 3px solid #ccc; padding-left: 15px; margin-left: 0; font-style: italic; color: #666; }
";

/// Generates a printable HTML document from an approved course.
pub struct HtmlGenerator<'a> {
    course: &'a ExportInput,
}

impl<'a> HtmlGenerator<'a> {
    /// Creates a HTML generator for `course`.
    #[must_use]
    pub const fn new(course: &'a ExportInput) -> Self {
        Self { course }
    }

    /// Generates the complete document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "<!DOCTYPE html>");
        let _ = writeln!(output, "<html lang=\"es\">");
        let _ = writeln!(output, "<head>");
        let _ = writeln!(output, "<meta charset=\"UTF-8\">");
        let _ = writeln!(output, "<title>{}</title>", escape_html(&self.course.title));
        let _ = writeln!(output, "<style>{STYLES}</style>");
        let _ = writeln!(output, "</head>");
        let _ = writeln!(output, "<body>");

        self.write_header(&mut output);
        for (index, section) in self.course.sections.iter().enumerate() {
            Self::write_section(&mut output, index + 1, section);
        }

        let _ = writeln!(output, "</body>");
        let _ = writeln!(output, "</html>");
        output
    }

    fn write_header(&self, output: &mut String) {
        let _ = writeln!(output, "<h1>{}</h1>", escape_html(&self.course.title));
        let _ = writeln!(
            output,
            "<p><strong>Audiencia Objetivo:</strong> {}</p>",
            escape_html(&self.course.audience)
        );
        let _ = writeln!(
            output,
            "<p><strong>Duración Estimada:</strong> {}</p>",
            escape_html(&self.course.duration)
        );
    }

    fn write_section(output: &mut String, number: usize, section: &ExportSection) {
        let _ = writeln!(output, "<div class=\"section-container\">");
        let _ = writeln!(
            output,
            "<h2>Sección {number}: {}</h2>",
            escape_html(&section.title)
        );
        output.push_str(&render_markdown(section.content_or_placeholder()));
        let _ = writeln!(output, "</div>");
    }
}

/// Renders Markdown to HTML with tables and strikethrough enabled.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(content, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Escapes text for use in HTML element content and attribute values.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
