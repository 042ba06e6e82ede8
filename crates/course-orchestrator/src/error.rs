//! Error types for the Course Architect orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, input validation, model backend calls,
//! workflow transitions and the concurrent section join.

use std::path::PathBuf;

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, CourseError>;

/// Errors that can occur while driving the course wizard.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help operators resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your course.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The model backend credential is not available.
    #[error("Missing model credential: environment variable '{variable}' is not set\n\nSuggestion: Export {variable} with a valid Gemini API key before starting the server")]
    MissingCredential {
        /// Name of the environment variable that should hold the key.
        variable: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// A required course input field is missing or blank.
    #[error("Invalid course input: '{field}' must not be empty")]
    ValidationError {
        /// Name of the offending field.
        field: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The model backend call failed or returned unusable output.
    #[error("Generation failed ({kind}): {message}")]
    GenerationError {
        /// Classification of the failure.
        kind: GenerationErrorKind,
        /// Detailed error message.
        message: String,
    },

    /// A section id was requested that the plan does not contain.
    ///
    /// Indicates a caller invariant breach rather than a retryable condition.
    #[error("Section '{section_id}' not found in the course plan")]
    SectionNotFound {
        /// The id that could not be resolved.
        section_id: String,
    },

    /// At least one of the concurrent section calls failed.
    #[error("Content generation failed for {failed} of {total} sections: {first}")]
    JoinFailure {
        /// Number of failed section calls.
        failed: usize,
        /// Number of section calls issued.
        total: usize,
        /// Message of the first failure in plan order.
        first: String,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot {operation} while in {from}")]
    InvalidStateTransition {
        /// The current step.
        from: String,
        /// The attempted operation.
        operation: String,
    },

    /// Another transition is still waiting on the backend.
    #[error("A generation request is already in progress")]
    Busy,

    /// The response belongs to a generation cycle that was abandoned.
    #[error("Generation cycle {session} was superseded (current session: {current})")]
    StaleSession {
        /// Session the response was issued under.
        session: u64,
        /// Session that is current now.
        current: u64,
    },
}

/// Categories of generation failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Authentication failure (invalid or revoked API key).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The response did not match the requested structure.
    MalformedResponse,
    /// The model refused or filtered the response.
    Blocked,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Blocked => write!(f, "blocked"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GenerationErrorKind {
    /// Classifies an HTTP status code returned by the model backend.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl CourseError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingCredential` error.
    #[must_use]
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Creates a new `ValidationError` for the named field.
    #[must_use]
    pub fn validation(field: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
        }
    }

    /// Creates a new `GenerationError`.
    #[must_use]
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self::GenerationError {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `GenerationError` for output that does not match the contract.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::generation(GenerationErrorKind::MalformedResponse, message)
    }

    /// Creates a new `SectionNotFound` error.
    #[must_use]
    pub fn section_not_found(section_id: impl Into<String>) -> Self {
        Self::SectionNotFound {
            section_id: section_id.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(
        from: impl std::fmt::Display,
        operation: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Returns `true` if the user may retry the operation that produced this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationError {
                kind: GenerationErrorKind::RateLimit
                    | GenerationErrorKind::Server
                    | GenerationErrorKind::Network
                    | GenerationErrorKind::MalformedResponse
                    | GenerationErrorKind::Blocked
                    | GenerationErrorKind::Other,
                ..
            } | Self::JoinFailure { .. }
                | Self::Busy
        )
    }

    /// Returns `true` if this error prevents the service from operating at all.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingCredential { .. }
                | Self::GenerationError {
                    kind: GenerationErrorKind::Authentication,
                    ..
                }
        )
    }
}
