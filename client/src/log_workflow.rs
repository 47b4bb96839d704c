//! Confirm-before-commit pipeline turning free-text logs into records.
//!
//! `Empty → Parsing → Parsed → Confirming → Empty` on success. A parse
//! failure returns to `Empty` with the raw text kept; a commit failure
//! returns to `Parsed` with the edits kept. Nothing is committed without a
//! prior parse.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use fitnesse_core::logs::{
    Estimate, EstimateField, GoalCheckIn, GoalCheckInRequest, LOG_TEXT_MAX_CHARS, LogCommitRequest,
    LogKind, LogReceipt, ParseRequest, ParseResult,
};

use crate::api::CoachApi;
use crate::app_state::AppStateAggregator;
use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogPhase {
    #[default]
    Empty,
    Parsing,
    Parsed,
    Confirming,
}

/// Editable copy of a parse result shown to the user before commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationForm {
    pub normalized_text: String,
    pub estimate: Estimate,
    /// Parser confidence, bounded to `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSnapshot {
    pub phase: LogPhase,
    pub raw_text: String,
    pub parsed: Option<ParseResult>,
    pub form: Option<ConfirmationForm>,
    /// Inline error from the last failed parse or commit.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct Draft {
    phase: LogPhase,
    raw_text: String,
    parsed: Option<ParseResult>,
    form: Option<ConfirmationForm>,
    error: Option<String>,
    /// Bumped by every new parse and by cancel; stale parse results are dropped.
    generation: u64,
}

pub struct LogParseWorkflow {
    kind: LogKind,
    api: Arc<dyn CoachApi>,
    app_state: Arc<AppStateAggregator>,
    draft: Mutex<Draft>,
}

impl LogParseWorkflow {
    pub fn new(kind: LogKind, api: Arc<dyn CoachApi>, app_state: Arc<AppStateAggregator>) -> Self {
        Self {
            kind,
            api,
            app_state,
            draft: Mutex::new(Draft::default()),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn phase(&self) -> LogPhase {
        self.draft().phase
    }

    pub fn snapshot(&self) -> LogSnapshot {
        let draft = self.draft();
        LogSnapshot {
            phase: draft.phase,
            raw_text: draft.raw_text.clone(),
            parsed: draft.parsed.clone(),
            form: draft.form.clone(),
            error: draft.error.clone(),
        }
    }

    /// Whether a new parse may start: the domain has a plan and nothing is
    /// in flight.
    pub async fn can_submit(&self) -> Result<bool, WorkflowError> {
        if self.is_busy() {
            return Ok(false);
        }
        Ok(self.app_state.has_plan(self.kind.domain()).await?)
    }

    /// Parse `text` into an editable estimate. Any earlier unconfirmed parse
    /// is discarded.
    pub async fn submit(&self, text: &str) -> Result<ConfirmationForm, WorkflowError> {
        let text = validate_text(text)?;
        if self.is_busy() {
            return Err(WorkflowError::Busy(self.kind));
        }
        let domain = self.kind.domain();
        if !self.app_state.has_plan(domain).await? {
            return Err(WorkflowError::PlanRequired(domain));
        }

        let generation = {
            let mut draft = self.draft();
            if matches!(draft.phase, LogPhase::Parsing | LogPhase::Confirming) {
                return Err(WorkflowError::Busy(self.kind));
            }
            draft.generation += 1;
            draft.phase = LogPhase::Parsing;
            draft.raw_text = text.clone();
            draft.parsed = None;
            draft.form = None;
            draft.error = None;
            draft.generation
        };

        tracing::debug!(kind = %self.kind, chars = text.chars().count(), "parsing log text");
        let request = ParseRequest {
            text,
            logged_at: None,
        };
        let result = self.api.parse_log(self.kind, &request).await;

        let mut draft = self.draft();
        if draft.generation != generation {
            tracing::debug!(kind = %self.kind, "dropping parse result for a cancelled draft");
            return Err(WorkflowError::Cancelled);
        }
        match result {
            Ok(parsed) => {
                // The stored result stays as the server sent it; it is
                // echoed back verbatim as `parsed_data` on commit.
                let confidence = parsed.clamped_confidence();
                if confidence != parsed.confidence {
                    tracing::warn!(
                        kind = %self.kind,
                        confidence = parsed.confidence,
                        clamped = confidence,
                        "parse confidence outside [0, 1]"
                    );
                }
                let form = ConfirmationForm {
                    normalized_text: parsed.normalized_text.clone(),
                    estimate: parsed.estimate(self.kind),
                    confidence,
                };
                draft.phase = LogPhase::Parsed;
                draft.parsed = Some(parsed);
                draft.form = Some(form.clone());
                Ok(form)
            }
            Err(err) => {
                tracing::warn!(kind = %self.kind, error = %err, "log parse failed");
                draft.phase = LogPhase::Empty;
                draft.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Overwrite one numeric field of the form. `None` marks it unknown.
    pub fn edit(&self, field: EstimateField, value: Option<f64>) -> Result<(), WorkflowError> {
        if value.is_some_and(|v| !(v.is_finite() && v >= 0.0)) {
            return Err(WorkflowError::InvalidValue { field });
        }
        let mut draft = self.draft();
        let form = editable_form(&mut draft, self.kind)?;
        if !form.estimate.set(field, value) {
            return Err(WorkflowError::UnknownField {
                kind: self.kind,
                field,
            });
        }
        Ok(())
    }

    pub fn edit_normalized_text(&self, text: &str) -> Result<(), WorkflowError> {
        let text = validate_text(text)?;
        let mut draft = self.draft();
        editable_form(&mut draft, self.kind)?.normalized_text = text;
        Ok(())
    }

    /// Commit the reviewed form. On success the draft resets and app state is
    /// refetched; on failure the draft returns to `Parsed` untouched.
    pub async fn confirm(&self) -> Result<LogReceipt, WorkflowError> {
        let request = {
            let mut draft = self.draft();
            match draft.phase {
                LogPhase::Empty => return Err(WorkflowError::NothingToConfirm),
                LogPhase::Parsing | LogPhase::Confirming => {
                    return Err(WorkflowError::Busy(self.kind));
                }
                LogPhase::Parsed => {}
            }
            let (Some(parsed), Some(form)) = (draft.parsed.clone(), draft.form.as_ref()) else {
                return Err(WorkflowError::NothingToConfirm);
            };
            let request = LogCommitRequest {
                raw_text: draft.raw_text.clone(),
                confirmed_data: self
                    .kind
                    .confirmed_data(&form.normalized_text, &form.estimate),
                parsed_data: parsed,
                logged_at: Utc::now(),
            };
            draft.phase = LogPhase::Confirming;
            draft.error = None;
            request
        };

        match self.api.commit_log(self.kind, &request).await {
            Ok(receipt) => {
                tracing::info!(kind = %self.kind, id = %receipt.id, "log committed");
                {
                    let mut draft = self.draft();
                    let generation = draft.generation;
                    *draft = Draft {
                        generation,
                        ..Draft::default()
                    };
                }
                self.app_state.invalidate();
                self.app_state.refresh_after_mutation().await;
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(kind = %self.kind, error = %err, "log commit failed");
                let mut draft = self.draft();
                draft.phase = LogPhase::Parsed;
                draft.error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Discard the draft without contacting the server. A commit already in
    /// flight cannot be cancelled.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        let mut draft = self.draft();
        if draft.phase == LogPhase::Confirming {
            return Err(WorkflowError::Busy(self.kind));
        }
        let generation = draft.generation + 1;
        *draft = Draft {
            generation,
            ..Draft::default()
        };
        Ok(())
    }

    fn is_busy(&self) -> bool {
        matches!(self.phase(), LogPhase::Parsing | LogPhase::Confirming)
    }

    fn draft(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn editable_form(draft: &mut Draft, kind: LogKind) -> Result<&mut ConfirmationForm, WorkflowError> {
    match draft.phase {
        LogPhase::Parsed => draft.form.as_mut().ok_or(WorkflowError::NothingToConfirm),
        LogPhase::Empty => Err(WorkflowError::NothingToConfirm),
        LogPhase::Parsing | LogPhase::Confirming => Err(WorkflowError::Busy(kind)),
    }
}

fn validate_text(text: &str) -> Result<String, WorkflowError> {
    let text = text.trim();
    let chars = text.chars().count();
    if chars == 0 || chars > LOG_TEXT_MAX_CHARS {
        return Err(WorkflowError::InvalidText {
            max: LOG_TEXT_MAX_CHARS,
        });
    }
    Ok(text.to_string())
}

/// Record a free-text goal check-in in one step, then refetch app state.
pub async fn check_in_goal(
    api: &dyn CoachApi,
    app_state: &AppStateAggregator,
    text: &str,
) -> Result<GoalCheckIn, WorkflowError> {
    let text = validate_text(text)?;
    let checkin = api
        .goal_checkin(&GoalCheckInRequest {
            text,
            logged_at: Some(Utc::now()),
        })
        .await?;
    tracing::info!(id = %checkin.id, "goal check-in recorded");
    app_state.invalidate();
    app_state.refresh_after_mutation().await;
    Ok(checkin)
}
