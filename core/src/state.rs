use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Plan-bearing domains reported by `GET /state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDomain {
    Nutrition,
    Training,
}

impl fmt::Display for PlanDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDomain::Nutrition => f.write_str("nutrition"),
            PlanDomain::Training => f.write_str("training"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan domain '{0}' (expected nutrition or training)")]
pub struct UnknownDomain(pub String);

impl FromStr for PlanDomain {
    type Err = UnknownDomain;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nutrition" | "meal" => Ok(PlanDomain::Nutrition),
            "training" | "workout" => Ok(PlanDomain::Training),
            _ => Err(UnknownDomain(raw.to_string())),
        }
    }
}

/// Minimal plan summary exposed to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub daily_calories: Option<f64>,
    #[serde(default)]
    pub macros: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub workouts_per_week: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionState {
    pub has_plan: bool,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub summary: Option<PlanSummary>,
}

/// Consolidated bootstrap state. Read-only from the client's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub user_id: String,
    pub onboarding_complete: bool,
    pub nutrition: SectionState,
    pub training: SectionState,
}

impl AppState {
    pub fn section(&self, domain: PlanDomain) -> &SectionState {
        match domain {
            PlanDomain::Nutrition => &self.nutrition,
            PlanDomain::Training => &self.training,
        }
    }

    pub fn has_plan(&self, domain: PlanDomain) -> bool {
        self.section(domain).has_plan
    }
}
