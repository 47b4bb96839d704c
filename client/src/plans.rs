//! Plan generation and day views.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use fitnesse_core::plans::{
    PLAN_DURATION_DAYS_MAX, PLAN_DURATION_DAYS_MIN, PlanGenerateSummary, PlanKind, PlanView,
};
use fitnesse_core::state::PlanDomain;

use crate::api::CoachApi;
use crate::app_state::AppStateAggregator;
use crate::error::PlanError;

pub struct PlanService {
    api: Arc<dyn CoachApi>,
    app_state: Arc<AppStateAggregator>,
}

impl PlanService {
    pub fn new(api: Arc<dyn CoachApi>, app_state: Arc<AppStateAggregator>) -> Self {
        Self { api, app_state }
    }

    /// Generate a new plan. App state is refetched afterwards because
    /// `has_plan` and the summary change.
    pub async fn generate(
        &self,
        kind: PlanKind,
        duration_days: u32,
    ) -> Result<PlanGenerateSummary, PlanError> {
        if !(PLAN_DURATION_DAYS_MIN..=PLAN_DURATION_DAYS_MAX).contains(&duration_days) {
            return Err(PlanError::InvalidDuration {
                min: PLAN_DURATION_DAYS_MIN,
                max: PLAN_DURATION_DAYS_MAX,
                got: duration_days,
            });
        }
        let summary = self.api.generate_plan(kind, duration_days).await?;
        tracing::info!(%kind, plan_id = %summary.plan_id, duration_days, "plan generated");
        self.app_state.invalidate();
        self.app_state.refresh_after_mutation().await;
        Ok(summary)
    }

    pub async fn view(
        &self,
        plan_id: &str,
        date: Option<NaiveDate>,
        include_detail: bool,
    ) -> Result<PlanView, PlanError> {
        Ok(self.api.plan_view(plan_id, date, include_detail).await?)
    }

    /// Today's view of the domain's active plan.
    pub async fn today(
        &self,
        domain: PlanDomain,
        include_detail: bool,
    ) -> Result<PlanView, PlanError> {
        let state = self.app_state.current().await?;
        let section = state.section(domain);
        let plan_id = match (section.has_plan, section.plan_id.as_deref()) {
            (true, Some(plan_id)) => plan_id.to_string(),
            _ => return Err(PlanError::NoPlan(domain)),
        };
        let today = Local::now().date_naive();
        self.view(&plan_id, Some(today), include_detail).await
    }
}
