//! Configuration types for the Course Architect orchestrator.
//!
//! This module provides the service configuration (model selection,
//! sampling temperatures, backend endpoint, content language) and the
//! model credential, which is read from the environment at startup.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CourseError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "course.json";

/// Environment variable holding the model API key.
pub const CREDENTIAL_ENV_VAR: &str = "API_KEY";

/// Default model for plan generation and revision.
fn default_plan_model() -> String {
    "gemini-3-flash-preview".to_string()
}

/// Default model for section content and chat.
fn default_content_model() -> String {
    "gemini-3-pro-preview".to_string()
}

/// Default base URL of the Generative Language REST API.
fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Default language the section content is written in.
fn default_content_language() -> String {
    "Spanish".to_string()
}

const fn default_plan_temperature() -> f32 {
    0.7
}

const fn default_revision_temperature() -> f32 {
    0.8
}

const fn default_content_temperature() -> f32 {
    0.6
}

/// Main configuration for the Course Architect service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Model used for plan generation and revision.
    #[serde(default = "default_plan_model")]
    pub plan_model: String,

    /// Model used for section content.
    #[serde(default = "default_content_model")]
    pub content_model: String,

    /// Model used by the chat assistant.
    #[serde(default = "default_content_model")]
    pub chat_model: String,

    /// Sampling temperature for initial plan generation.
    #[serde(default = "default_plan_temperature")]
    pub plan_temperature: f32,

    /// Sampling temperature for plan revision.
    #[serde(default = "default_revision_temperature")]
    pub revision_temperature: f32,

    /// Sampling temperature for section content.
    #[serde(default = "default_content_temperature")]
    pub content_temperature: f32,

    /// Language the section content is written in.
    #[serde(default = "default_content_language")]
    pub content_language: String,

    /// Base URL of the model REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plan_model: default_plan_model(),
            content_model: default_content_model(),
            chat_model: default_content_model(),
            plan_temperature: default_plan_temperature(),
            revision_temperature: default_revision_temperature(),
            content_temperature: default_content_temperature(),
            content_language: default_content_language(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `course.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            CourseError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `course.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::ConfigParseError` if the file exists but cannot be
    /// read or parsed, and `CourseError::ConfigValidationError` if a value is
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(CourseError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CourseError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Model names, the content language and the API base URL must be
    /// non-empty, and every temperature must lie in `0.0..=2.0`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("planModel", &self.plan_model),
            ("contentModel", &self.content_model),
            ("chatModel", &self.chat_model),
            ("contentLanguage", &self.content_language),
        ] {
            if value.trim().is_empty() {
                return Err(CourseError::config_validation(
                    format!("{name} must not be empty"),
                    format!("Set {name} in your course.json or remove it to use the default"),
                ));
            }
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(CourseError::config_validation(
                format!("apiBaseUrl '{}' is not an http(s) URL", self.api_base_url),
                "Use the form https://generativelanguage.googleapis.com/v1beta",
            ));
        }

        for (name, value) in [
            ("planTemperature", self.plan_temperature),
            ("revisionTemperature", self.revision_temperature),
            ("contentTemperature", self.content_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(CourseError::config_validation(
                    format!("{name} must be between 0.0 and 2.0 (got {value})"),
                    format!("Set {name} to a value such as 0.7 in your course.json"),
                ));
            }
        }

        Ok(())
    }
}

/// API key for the model backend.
///
/// The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Reads the credential from the `API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::MissingCredential` when the variable is unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(CREDENTIAL_ENV_VAR).ok())
    }

    /// Builds a credential from an optional raw value.
    pub fn from_value(value: Option<String>) -> Result<Self> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self)
            .ok_or_else(|| CourseError::missing_credential(CREDENTIAL_ENV_VAR))
    }

    /// The raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
