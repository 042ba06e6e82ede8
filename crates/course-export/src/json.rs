//! JSON export.
//!
//! [`JsonGenerator`] serializes an [`ExportInput`] as compact single-line
//! JSON or pretty-printed for human readability.
//!
//! # Example
//!
//! ```rust
//! use course_export::json::JsonGenerator;
//! use course_export::ExportInput;
//!
//! let course = ExportInput::default();
//! let generator = JsonGenerator::new(&course);
//!
//! let compact = generator.generate().unwrap();
//! assert!(!compact.contains('\n'));
//!
//! // generator.write_to_file(std::path::Path::new("course.json"), true).unwrap();
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{ExportError, ExportInput, Result};

/// JSON course generator.
pub struct JsonGenerator<'a> {
    course: &'a ExportInput,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a JSON generator for `course`.
    #[must_use]
    pub const fn new(course: &'a ExportInput) -> Self {
        Self { course }
    }

    /// Generates compact JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.course).map_err(ExportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.course).map_err(ExportError::from)
    }

    /// Writes the JSON document to `path`, creating or overwriting it.
    ///
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if JSON serialization fails.
    /// Returns [`ExportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}
