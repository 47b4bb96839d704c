use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::state::PlanDomain;

pub const PLAN_DURATION_DAYS_MIN: u32 = 7;
pub const PLAN_DURATION_DAYS_MAX: u32 = 90;
pub const PLAN_DURATION_DAYS_DEFAULT: u32 = 30;

/// Which generator `POST /plans/{kind}` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Meal,
    Workout,
}

impl PlanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanKind::Meal => "meal",
            PlanKind::Workout => "workout",
        }
    }

    pub fn domain(self) -> PlanDomain {
        match self {
            PlanKind::Meal => PlanDomain::Nutrition,
            PlanKind::Workout => PlanDomain::Training,
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan kind '{0}' (expected meal or workout)")]
pub struct UnknownPlanKind(pub String);

impl FromStr for PlanKind {
    type Err = UnknownPlanKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "meal" | "nutrition" => Ok(PlanKind::Meal),
            "workout" | "training" => Ok(PlanKind::Workout),
            _ => Err(UnknownPlanKind(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanGenerateRequest {
    pub duration_days: u32,
}

/// Descriptor returned by plan generation. The client only uses it to report
/// back and to trigger a state refetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGenerateSummary {
    pub plan_id: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanViewTargets {
    #[serde(default)]
    pub daily_calories: Option<f64>,
    #[serde(default)]
    pub macros: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanViewMeal {
    pub meal_type: String,
    pub name: String,
    #[serde(default)]
    pub nutrition: Option<serde_json::Map<String, serde_json::Value>>,
    /// Ingredients and instructions when `include_detail` was requested.
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanViewWorkout {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// One day of a plan (`GET /plans/{id}/view`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub date: String,
    pub plan_type: String,
    #[serde(default)]
    pub targets: Option<PlanViewTargets>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub meals: Vec<PlanViewMeal>,
    #[serde(default)]
    pub workout: Option<PlanViewWorkout>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub exercises: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
