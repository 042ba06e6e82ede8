//! Course wizard state machine.
//!
//! [`Workflow`] owns the single [`WorkflowState`] of a wizard session and
//! exposes the transitions the presentation layer invokes:
//!
//! ```text
//! CREATE ──submit_input──▶ GENERATING_PLAN ──ok──▶ REVIEW_PLAN
//!   ▲                            │ err                 │  │
//!   └────────────────────────────┘                     │  │ request_revision
//!                                                      │  ▼
//!                         REVIEW_PLAN ◀──ok/err── GENERATING_PLAN
//!                                                      │
//!                                     approve_plan     ▼
//!             REVIEW_PLAN ◀──err── GENERATING_CONTENT ──ok──▶ REVIEW_CONTENT
//!                                                                  │ approve_content
//!                                                                  ▼
//!                                                              COMPLETED
//! ```
//!
//! `reset` returns to `CREATE` from anywhere.
//!
//! Remote-call transitions follow a single-flight rule: while `loading` is
//! set no other transition starts. Every remote-call transition and every
//! reset bumps a session counter; a response that comes back under an old
//! session is discarded instead of applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::course::{CourseContentMap, CourseInput, CoursePlan};
use crate::error::{CourseError, Result};
use crate::generation::CourseGenerator;
use crate::websocket::{EventBroadcaster, WorkflowEvent};

/// Shown when the first plan could not be generated.
pub const PLAN_FAILED_MESSAGE: &str = "Failed to generate course plan. Please try again.";

/// Shown when a plan revision failed.
pub const REVISION_FAILED_MESSAGE: &str = "Failed to regenerate plan. Please try again.";

/// Shown when section content could not be generated.
pub const CONTENT_FAILED_MESSAGE: &str = "Failed to generate content. Please try again.";

/// Shown when a transition was abandoned before its response arrived.
pub const INTERRUPTED_MESSAGE: &str = "Generation was interrupted. Please try again.";

// ============================================================================
// GenerationStep
// ============================================================================

/// Wizard step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStep {
    /// Collecting course parameters.
    #[default]
    Create,
    /// Waiting for a plan (first generation or revision).
    GeneratingPlan,
    /// Plan is shown for approval or revision.
    ReviewPlan,
    /// Waiting for the section contents.
    GeneratingContent,
    /// Content is shown for approval.
    ReviewContent,
    /// Course approved; ready for export.
    Completed,
}

impl GenerationStep {
    /// All steps in wizard order.
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::GeneratingPlan,
        Self::ReviewPlan,
        Self::GeneratingContent,
        Self::ReviewContent,
        Self::Completed,
    ];

    /// Returns `true` for the final step.
    ///
    /// # Examples
    ///
    /// ```
    /// use course_orchestrator::GenerationStep;
    ///
    /// assert!(GenerationStep::Completed.is_terminal());
    /// assert!(!GenerationStep::ReviewContent.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` while a remote call is outstanding for this step.
    #[must_use]
    pub const fn is_generating(&self) -> bool {
        matches!(self, Self::GeneratingPlan | Self::GeneratingContent)
    }

    /// Wire name of the step.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::GeneratingPlan => "GENERATING_PLAN",
            Self::ReviewPlan => "REVIEW_PLAN",
            Self::GeneratingContent => "GENERATING_CONTENT",
            Self::ReviewContent => "REVIEW_CONTENT",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for GenerationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// WorkflowState
// ============================================================================

/// Everything the wizard knows about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Current step.
    pub step: GenerationStep,
    /// Parameters of the active generation cycle.
    pub input: Option<CourseInput>,
    /// Current plan.
    pub plan: Option<CoursePlan>,
    /// Generated content, one entry per plan section once complete.
    pub content_map: CourseContentMap,
    /// Set while a remote call is outstanding.
    pub loading: bool,
    /// User-facing message of the last failed transition.
    pub error: Option<String>,
}

impl WorkflowState {
    /// Returns `true` when a plan and a full content map are available.
    #[must_use]
    pub fn has_complete_content(&self) -> bool {
        self.plan.as_ref().is_some_and(|plan| {
            plan.sections.len() == self.content_map.len()
                && plan
                    .section_ids()
                    .all(|id| self.content_map.contains_key(id))
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: WorkflowState,
    session: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// In-flight guard
// ============================================================================

/// Marks a transition that is waiting on the backend.
///
/// If the transition future is dropped before [`InFlight::complete`] runs,
/// the guard clears `loading` and reverts the step so the wizard never
/// stays stuck in a generating step.
struct InFlight {
    inner: Arc<Mutex<Inner>>,
    events: EventBroadcaster,
    session: u64,
    revert_to: GenerationStep,
    armed: bool,
}

impl InFlight {
    fn complete(mut self) -> (u64, GenerationStep) {
        self.armed = false;
        (self.session, self.revert_to)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut inner = lock(&self.inner);
        if inner.session != self.session || !inner.state.step.is_generating() {
            return;
        }

        let from = inner.state.step;
        inner.state.loading = false;
        inner.state.step = self.revert_to;
        inner.state.error = Some(INTERRUPTED_MESSAGE.to_string());
        if self.revert_to == GenerationStep::Create {
            inner.state.input = None;
        }

        warn!(
            session = self.session,
            from = %from,
            to = %self.revert_to,
            "Generation abandoned before completion"
        );
        self.events
            .send(WorkflowEvent::generation_failed(from, INTERRUPTED_MESSAGE));
        self.events
            .send(WorkflowEvent::step_changed(from, self.revert_to, self.session));
    }
}

// ============================================================================
// Concurrent section join
// ============================================================================

/// Generates every section of `plan` concurrently and joins the results.
///
/// All calls are dispatched at once and the join waits for every one of them
/// to settle. Each result is keyed by the id of the section it was issued
/// for, so completion order has no effect on the map, which follows plan
/// order. If any call fails nothing is returned but the failure.
pub async fn generate_all_sections(
    generator: &dyn CourseGenerator,
    input: &CourseInput,
    plan: &CoursePlan,
) -> Result<CourseContentMap> {
    let calls = plan.sections.iter().map(|section| async move {
        let outcome = generator
            .generate_section_content(input, plan, &section.id)
            .await;
        (section.id.as_str(), outcome)
    });

    let settled = join_all(calls).await;
    let total = settled.len();

    let mut content = CourseContentMap::with_capacity(total);
    let mut failures = Vec::new();
    for (id, outcome) in settled {
        match outcome {
            Ok(text) => {
                content.insert(id.to_string(), text);
            }
            Err(e) => failures.push((id, e)),
        }
    }

    if let Some((id, first)) = failures.first() {
        warn!(failed = failures.len(), total, "Section generation failed");
        return Err(CourseError::JoinFailure {
            failed: failures.len(),
            total,
            first: format!("{id}: {first}"),
        });
    }

    // one entry per section, or nothing
    if content.len() != total {
        warn!(entries = content.len(), total, "Section ids collided in the content map");
        return Err(CourseError::JoinFailure {
            failed: total - content.len(),
            total,
            first: "plan contains duplicate section ids".to_string(),
        });
    }

    Ok(content)
}

// ============================================================================
// Workflow
// ============================================================================

/// The wizard state machine.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Workflow {
    generator: Arc<dyn CourseGenerator>,
    inner: Arc<Mutex<Inner>>,
    events: EventBroadcaster,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Creates a workflow in the initial state.
    #[must_use]
    pub fn new(generator: Arc<dyn CourseGenerator>) -> Self {
        Self::with_broadcaster(generator, EventBroadcaster::default())
    }

    /// Creates a workflow that publishes its events on `events`.
    #[must_use]
    pub fn with_broadcaster(generator: Arc<dyn CourseGenerator>, events: EventBroadcaster) -> Self {
        Self {
            generator,
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
        }
    }

    /// The event broadcaster for this workflow.
    #[must_use]
    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> WorkflowState {
        lock(&self.inner).state.clone()
    }

    /// The current session id.
    #[must_use]
    pub fn session(&self) -> u64 {
        lock(&self.inner).session
    }

    /// The current state together with the session it belongs to.
    #[must_use]
    pub fn snapshot_with_session(&self) -> (WorkflowState, u64) {
        let inner = lock(&self.inner);
        (inner.state.clone(), inner.session)
    }

    /// Stores `input` and generates the first plan.
    ///
    /// Legal only from `CREATE`. On failure the wizard returns to `CREATE`
    /// without the input.
    pub async fn submit_input(&self, input: CourseInput) -> Result<WorkflowState> {
        let flight = {
            let mut inner = lock(&self.inner);
            ensure_idle(&inner.state)?;
            ensure_step(&inner.state, GenerationStep::Create, "submit course input")?;
            input.validate()?;

            inner.state.input = Some(input.clone());
            self.start_flight(
                &mut inner,
                GenerationStep::GeneratingPlan,
                GenerationStep::Create,
            )
        };

        info!(topic = %input.topic, "Submitting course input");
        let result = self.generator.generate_plan(&input).await.and_then(validated);

        self.settle(
            flight,
            result,
            PLAN_FAILED_MESSAGE,
            |state, plan| {
                state.plan = Some(plan);
                state.step = GenerationStep::ReviewPlan;
            },
            |state| {
                state.input = None;
                state.plan = None;
            },
        )
    }

    /// Regenerates the plan with the user's `feedback`.
    ///
    /// Legal only from `REVIEW_PLAN` with an input and a plan. The new plan
    /// replaces the old one entirely; on failure the old plan is kept.
    pub async fn request_revision(&self, feedback: impl Into<String>) -> Result<WorkflowState> {
        let feedback = feedback.into();

        let (flight, input, previous) = {
            let mut inner = lock(&self.inner);
            ensure_idle(&inner.state)?;
            ensure_step(&inner.state, GenerationStep::ReviewPlan, "request a revision")?;
            let (Some(input), Some(previous)) =
                (inner.state.input.clone(), inner.state.plan.clone())
            else {
                return Err(CourseError::invalid_transition(
                    inner.state.step,
                    "request a revision without a plan",
                ));
            };

            let flight = self.start_flight(
                &mut inner,
                GenerationStep::GeneratingPlan,
                GenerationStep::ReviewPlan,
            );
            (flight, input, previous)
        };

        info!(feedback_len = feedback.len(), "Requesting plan revision");
        let result = self
            .generator
            .regenerate_plan(&input, &previous, &feedback)
            .await
            .and_then(validated);

        self.settle(
            flight,
            result,
            REVISION_FAILED_MESSAGE,
            |state, plan| {
                state.plan = Some(plan);
                state.step = GenerationStep::ReviewPlan;
            },
            |_| {},
        )
    }

    /// Approves the plan and generates the content of every section.
    ///
    /// Legal only from `REVIEW_PLAN` with a plan. Sections are generated
    /// concurrently; if any fails, no content is kept and the wizard returns
    /// to `REVIEW_PLAN`.
    pub async fn approve_plan(&self) -> Result<WorkflowState> {
        let (flight, input, plan) = {
            let mut inner = lock(&self.inner);
            ensure_idle(&inner.state)?;
            ensure_step(&inner.state, GenerationStep::ReviewPlan, "approve the plan")?;
            let (Some(input), Some(plan)) = (inner.state.input.clone(), inner.state.plan.clone())
            else {
                return Err(CourseError::invalid_transition(
                    inner.state.step,
                    "approve a missing plan",
                ));
            };

            inner.state.content_map.clear();
            let flight = self.start_flight(
                &mut inner,
                GenerationStep::GeneratingContent,
                GenerationStep::ReviewPlan,
            );
            (flight, input, plan)
        };

        info!(sections = plan.sections.len(), "Plan approved, generating content");
        let result = generate_all_sections(self.generator.as_ref(), &input, &plan).await;

        self.settle(
            flight,
            result,
            CONTENT_FAILED_MESSAGE,
            |state, content| {
                state.content_map = content;
                state.step = GenerationStep::ReviewContent;
            },
            |state| state.content_map.clear(),
        )
    }

    /// Approves the generated content.
    ///
    /// Legal from `REVIEW_CONTENT`; calling it again once `COMPLETED` leaves
    /// the state untouched.
    pub fn approve_content(&self) -> Result<WorkflowState> {
        let mut inner = lock(&self.inner);
        if inner.state.step == GenerationStep::Completed {
            return Ok(inner.state.clone());
        }
        ensure_step(&inner.state, GenerationStep::ReviewContent, "approve the content")?;
        if !inner.state.has_complete_content() {
            return Err(CourseError::invalid_transition(
                inner.state.step,
                "approve incomplete content",
            ));
        }

        inner.state.step = GenerationStep::Completed;
        info!(session = inner.session, "Course content approved");
        self.events.send(WorkflowEvent::step_changed(
            GenerationStep::ReviewContent,
            GenerationStep::Completed,
            inner.session,
        ));
        Ok(inner.state.clone())
    }

    /// Discards the session and returns to `CREATE`.
    ///
    /// Responses still in flight are ignored when they arrive.
    pub fn reset(&self) -> WorkflowState {
        let mut inner = lock(&self.inner);
        let from = inner.state.step;
        inner.session += 1;
        inner.state = WorkflowState::default();

        info!(session = inner.session, from = %from, "Workflow reset");
        self.events.send(WorkflowEvent::reset(inner.session));
        inner.state.clone()
    }

    fn start_flight(
        &self,
        inner: &mut Inner,
        entering: GenerationStep,
        revert_to: GenerationStep,
    ) -> InFlight {
        inner.session += 1;
        let from = inner.state.step;
        inner.state.loading = true;
        inner.state.error = None;
        inner.state.step = entering;

        self.events
            .send(WorkflowEvent::step_changed(from, entering, inner.session));

        InFlight {
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
            session: inner.session,
            revert_to,
            armed: true,
        }
    }

    fn settle<T>(
        &self,
        flight: InFlight,
        result: Result<T>,
        failure_message: &str,
        on_success: impl FnOnce(&mut WorkflowState, T),
        on_failure: impl FnOnce(&mut WorkflowState),
    ) -> Result<WorkflowState> {
        let (session, revert_to) = flight.complete();
        let mut inner = lock(&self.inner);

        if inner.session != session {
            info!(
                session,
                current = inner.session,
                "Discarding response from abandoned generation cycle"
            );
            return Err(CourseError::StaleSession {
                session,
                current: inner.session,
            });
        }

        let from = inner.state.step;
        inner.state.loading = false;

        match result {
            Ok(value) => {
                on_success(&mut inner.state, value);
                let to = inner.state.step;
                info!(session, from = %from, to = %to, "Generation succeeded");

                if let Some(event) = ready_event(&inner.state) {
                    self.events.send(event);
                }
                self.events.send(WorkflowEvent::step_changed(from, to, session));
                Ok(inner.state.clone())
            }
            Err(e) => {
                inner.state.step = revert_to;
                inner.state.error = Some(failure_message.to_string());
                on_failure(&mut inner.state);
                warn!(
                    session,
                    from = %from,
                    to = %revert_to,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Generation failed"
                );

                self.events
                    .send(WorkflowEvent::generation_failed(from, failure_message));
                self.events
                    .send(WorkflowEvent::step_changed(from, revert_to, session));
                Err(e)
            }
        }
    }
}

fn validated(plan: CoursePlan) -> Result<CoursePlan> {
    plan.validate()?;
    Ok(plan)
}

fn ensure_idle(state: &WorkflowState) -> Result<()> {
    if state.loading {
        return Err(CourseError::Busy);
    }
    Ok(())
}

fn ensure_step(state: &WorkflowState, expected: GenerationStep, operation: &str) -> Result<()> {
    if state.step != expected {
        return Err(CourseError::invalid_transition(state.step, operation));
    }
    Ok(())
}

fn ready_event(state: &WorkflowState) -> Option<WorkflowEvent> {
    let plan = state.plan.as_ref()?;
    match state.step {
        GenerationStep::ReviewPlan => Some(WorkflowEvent::plan_ready(plan)),
        GenerationStep::ReviewContent => Some(WorkflowEvent::content_ready(&state.content_map)),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
