//! Generation client: the three course calls against the model backend.
//!
//! [`CourseGenerator`] is what the workflow depends on. [`GenerationClient`]
//! implements it on top of any [`ModelBackend`], adding prompts, the plan
//! schema, response parsing and plan validation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backend::{ModelBackend, ModelRequest};
use crate::config::Config;
use crate::course::{CourseInput, CoursePlan};
use crate::error::{CourseError, Result};
use crate::prompt;

/// The generation operations the workflow issues.
#[async_trait]
pub trait CourseGenerator: Send + Sync {
    /// Produces the first plan for `input`.
    async fn generate_plan(&self, input: &CourseInput) -> Result<CoursePlan>;

    /// Produces a replacement for `previous` that takes `feedback` into account.
    async fn regenerate_plan(
        &self,
        input: &CourseInput,
        previous: &CoursePlan,
        feedback: &str,
    ) -> Result<CoursePlan>;

    /// Produces the markdown body of the section `section_id` of `plan`.
    async fn generate_section_content(
        &self,
        input: &CourseInput,
        plan: &CoursePlan,
        section_id: &str,
    ) -> Result<String>;
}

/// Parses a structured-output response into a validated plan.
///
/// Malformed JSON is a hard failure; there is no repair or retry.
pub fn parse_plan(text: &str) -> Result<CoursePlan> {
    let plan: CoursePlan = serde_json::from_str(text.trim())
        .map_err(|e| CourseError::malformed(format!("plan is not valid JSON: {e}")))?;
    plan.validate()?;
    Ok(plan)
}

/// [`CourseGenerator`] backed by a hosted model.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn ModelBackend>,
    config: Config,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Creates a client over `backend` using the models and temperatures in `config`.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    async fn request_plan(&self, request: ModelRequest) -> Result<CoursePlan> {
        let response = self.backend.generate(request).await?;
        let plan = parse_plan(&response.text)?;
        info!(
            title = %plan.title,
            sections = plan.sections.len(),
            "Plan generated"
        );
        Ok(plan)
    }
}

#[async_trait]
impl CourseGenerator for GenerationClient {
    async fn generate_plan(&self, input: &CourseInput) -> Result<CoursePlan> {
        debug!(topic = %input.topic, "Generating course plan");
        let request = ModelRequest::prompt(&self.config.plan_model, prompt::plan_prompt(input))
            .with_schema(prompt::course_plan_schema())
            .with_temperature(self.config.plan_temperature);
        self.request_plan(request).await
    }

    async fn regenerate_plan(
        &self,
        input: &CourseInput,
        previous: &CoursePlan,
        feedback: &str,
    ) -> Result<CoursePlan> {
        debug!(
            topic = %input.topic,
            feedback_len = feedback.len(),
            "Regenerating course plan"
        );
        let request = ModelRequest::prompt(
            &self.config.plan_model,
            prompt::revision_prompt(input, previous, feedback),
        )
        .with_schema(prompt::course_plan_schema())
        .with_temperature(self.config.revision_temperature);
        self.request_plan(request).await
    }

    async fn generate_section_content(
        &self,
        input: &CourseInput,
        plan: &CoursePlan,
        section_id: &str,
    ) -> Result<String> {
        let section = plan
            .section(section_id)
            .ok_or_else(|| CourseError::section_not_found(section_id))?;

        debug!(section_id, title = %section.title, "Generating section content");
        let request = ModelRequest::prompt(
            &self.config.content_model,
            prompt::section_prompt(input, section, &self.config.content_language),
        )
        .with_temperature(self.config.content_temperature);

        let response = self.backend.generate(request).await?;
        Ok(response.text.trim().to_string())
    }
}
