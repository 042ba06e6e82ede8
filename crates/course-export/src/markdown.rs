//! Markdown export.
//!
//! The document starts with the course title and its audience and duration,
//! followed by every section in plan order:
//!
//! ```text
//! # {title}
//!
//! **Audiencia Objetivo:** {audience}
//!
//! **Duración Estimada:** {duration}
//!
//! ## Sección 1: {section title}
//!
//! {section content}
//! ```

use std::fmt::Write;

use crate::{ExportInput, ExportSection};

/// Generates a Markdown document from an approved course.
pub struct MarkdownGenerator<'a> {
    course: &'a ExportInput,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a Markdown generator for `course`.
    #[must_use]
    pub const fn new(course: &'a ExportInput) -> Self {
        Self { course }
    }

    /// Generates the complete document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_header(&mut output);
        for (index, section) in self.course.sections.iter().enumerate() {
            Self::write_section(&mut output, index + 1, section);
        }

        output
    }

    fn write_header(&self, output: &mut String) {
        let _ = writeln!(output, "# {}\n", single_line(&self.course.title));
        let _ = writeln!(
            output,
            "**Audiencia Objetivo:** {}\n",
            single_line(&self.course.audience)
        );
        let _ = writeln!(
            output,
            "**Duración Estimada:** {}\n",
            single_line(&self.course.duration)
        );
    }

    fn write_section(output: &mut String, number: usize, section: &ExportSection) {
        let _ = writeln!(
            output,
            "## Sección {number}: {}\n",
            single_line(&section.title)
        );
        let _ = writeln!(output, "{}\n", section.content_or_placeholder().trim());
    }
}

/// Collapses line breaks so a value cannot escape its heading or paragraph.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
