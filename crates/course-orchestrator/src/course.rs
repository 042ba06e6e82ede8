//! Course data model shared by the workflow and the generation client.
//!
//! Field names match the JSON schema requested from the model, so a plan
//! returned by the backend deserializes directly into [`CoursePlan`].

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CourseError, Result};

/// Generated markdown keyed by section id, in the plan's section order.
pub type CourseContentMap = IndexMap<String, String>;

// ============================================================================
// CourseInput
// ============================================================================

/// Parameters collected on the first wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInput {
    /// Subject of the course.
    pub topic: String,
    /// What learners should be able to do afterwards.
    pub objective: String,
    /// Who the course is for.
    pub audience: String,
    /// Free-form constraints, tone or extra details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<String>,
}

impl CourseInput {
    /// Creates an input without restrictions.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        objective: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            objective: objective.into(),
            audience: audience.into(),
            restrictions: None,
        }
    }

    /// Sets the restrictions field.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: impl Into<String>) -> Self {
        self.restrictions = Some(restrictions.into());
        self
    }

    /// Checks that topic, objective and audience are present.
    ///
    /// Whitespace-only values count as missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use course_orchestrator::CourseInput;
    ///
    /// assert!(CourseInput::new("Rust", "Write CLIs", "Developers").validate().is_ok());
    /// assert!(CourseInput::new("Rust", "  ", "Developers").validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("topic", &self.topic),
            ("objective", &self.objective),
            ("audience", &self.audience),
        ] {
            if value.trim().is_empty() {
                return Err(CourseError::validation(field));
            }
        }
        Ok(())
    }

    /// Restrictions text, or `None` when absent or blank.
    #[must_use]
    pub fn restrictions_text(&self) -> Option<&str> {
        self.restrictions
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

// ============================================================================
// CoursePlan
// ============================================================================

/// A leaf entry inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSection {
    /// Subsection heading.
    pub title: String,
    /// One-line summary.
    pub description: String,
}

/// One section of a course plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSection {
    /// Identifier unique within the plan, e.g. `section_1`.
    pub id: String,
    /// Section heading.
    pub title: String,
    /// One-sentence summary.
    pub description: String,
    /// Learning objectives for this section.
    pub objectives: Vec<String>,
    /// Ordered subsections.
    pub subsections: Vec<SubSection>,
}

/// Structured outline of a course as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoursePlan {
    /// Course title.
    pub title: String,
    /// Refined description of the target audience.
    pub audience: String,
    /// Estimated total duration, e.g. "6 hours".
    pub duration: String,
    /// Ordered sections.
    pub sections: Vec<CourseSection>,
}

impl CoursePlan {
    /// Looks up a section by id.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&CourseSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Section ids in plan order.
    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }

    /// Checks the structural invariants the workflow relies on.
    ///
    /// The plan needs a title, at least one section, and non-empty section
    /// ids with no duplicates, since ids are the join key for content.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CourseError::malformed("plan has an empty title"));
        }
        if self.sections.is_empty() {
            return Err(CourseError::malformed("plan has no sections"));
        }

        let mut seen = HashSet::with_capacity(self.sections.len());
        for (index, section) in self.sections.iter().enumerate() {
            if section.id.trim().is_empty() {
                return Err(CourseError::malformed(format!(
                    "section {} has an empty id",
                    index + 1
                )));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(CourseError::malformed(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// ChatMessage
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the wizard.
    User,
    /// The model.
    Model,
}

/// One message in a conversation with the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: ChatRole,
    /// Message text (markdown for model replies).
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates a model message.
    #[must_use]
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn test_input_validate_requires_fields() {
        assert!(fixtures::input().validate().is_ok());

        let err = CourseInput::new("", "objective", "audience")
            .validate()
            .unwrap_err();
        assert!(matches!(err, CourseError::ValidationError { ref field } if field == "topic"));

        let err = CourseInput::new("topic", "objective", " \t")
            .validate()
            .unwrap_err();
        assert!(matches!(err, CourseError::ValidationError { ref field } if field == "audience"));
    }

    #[test]
    fn test_input_restrictions_optional() {
        let input = fixtures::input();
        assert!(input.restrictions_text().is_none());

        let input = input.clone().with_restrictions("   ");
        assert!(input.validate().is_ok());
        assert!(input.restrictions_text().is_none());

        let input = input.with_restrictions(" Tono informal ");
        assert_eq!(input.restrictions_text(), Some("Tono informal"));
    }

    #[test]
    fn test_input_deserialization_without_restrictions() {
        let json = r#"{"topic":"Rust","objective":"CLIs","audience":"Devs"}"#;
        let input: CourseInput = serde_json::from_str(json).unwrap();
        assert!(input.restrictions.is_none());

        let out = serde_json::to_string(&input).unwrap();
        assert!(!out.contains("restrictions"));
    }

    #[test]
    fn test_plan_deserializes_schema_output() {
        let json = r#"{
            "title": "Intro to Rust",
            "audience": "Backend developers",
            "duration": "8 hours",
            "sections": [{
                "id": "section_1",
                "title": "Ownership",
                "description": "Moves and borrows.",
                "objectives": ["Explain moves"],
                "subsections": [{"title": "Borrowing", "description": "References"}]
            }]
        }"#;

        let plan: CoursePlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.sections.len(), 1);
        assert_eq!(plan.section("section_1").unwrap().title, "Ownership");
        assert!(plan.section("section_2").is_none());
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_plan_validate_rejects_duplicate_ids() {
        let plan = fixtures::plan("Course", &["s1", "s2", "s1"]);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate section id 's1'"));
    }

    #[test]
    fn test_plan_validate_rejects_empty_ids_and_sections() {
        let plan = fixtures::plan("Course", &["s1", " "]);
        assert!(plan.validate().is_err());

        let plan = fixtures::plan("Course", &[]);
        assert!(plan.validate().unwrap_err().to_string().contains("no sections"));

        let plan = fixtures::plan("", &["s1"]);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_section_ids_in_order() {
        let plan = fixtures::plan("Course", &["b", "a", "c"]);
        assert_eq!(plan.section_ids().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_chat_message_serialization() {
        let msg = ChatMessage::model("Hola");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"model","content":"Hola"}"#);

        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"Hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::user("Hi"));
    }
}
