use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::state::PlanDomain;

pub const LOG_TEXT_MAX_CHARS: usize = 4000;

/// Free-text activity logs that go through parse → confirm → commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Meal,
    Workout,
}

impl LogKind {
    pub fn parse_path(self) -> &'static str {
        match self {
            LogKind::Meal => "/logs/meals/parse",
            LogKind::Workout => "/logs/workouts/parse",
        }
    }

    pub fn commit_path(self) -> &'static str {
        match self {
            LogKind::Meal => "/logs/meals",
            LogKind::Workout => "/logs/workouts",
        }
    }

    /// Logging is only available once this domain has a plan.
    pub fn domain(self) -> PlanDomain {
        match self {
            LogKind::Meal => PlanDomain::Nutrition,
            LogKind::Workout => PlanDomain::Training,
        }
    }

    pub fn fields(self) -> &'static [EstimateField] {
        match self {
            LogKind::Meal => &[
                EstimateField::Calories,
                EstimateField::ProteinG,
                EstimateField::CarbsG,
                EstimateField::FatG,
            ],
            LogKind::Workout => &[
                EstimateField::TotalDurationMinutes,
                EstimateField::EstimatedCaloriesBurned,
            ],
        }
    }

    /// Meal numbers sit under `estimate`; workout numbers are top-level.
    fn estimate_container(self) -> Option<&'static str> {
        match self {
            LogKind::Meal => Some("estimate"),
            LogKind::Workout => None,
        }
    }

    /// Build `confirmed_data` from the (possibly edited) confirmation form.
    /// Unset fields are sent as `null`, never as zero.
    pub fn confirmed_data(self, normalized_text: &str, estimate: &Estimate) -> Value {
        let mut numbers = Map::new();
        for field in self.fields() {
            numbers.insert(field.key().to_string(), json!(estimate.get(*field)));
        }
        let mut data = Map::new();
        data.insert("normalized_text".to_string(), json!(normalized_text));
        match self.estimate_container() {
            Some(container) => {
                data.insert(container.to_string(), Value::Object(numbers));
            }
            None => data.extend(numbers),
        }
        Value::Object(data)
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Meal => f.write_str("meal"),
            LogKind::Workout => f.write_str("workout"),
        }
    }
}

/// Numeric fields a user may edit before confirming a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EstimateField {
    Calories,
    ProteinG,
    CarbsG,
    FatG,
    TotalDurationMinutes,
    EstimatedCaloriesBurned,
}

impl EstimateField {
    pub fn key(self) -> &'static str {
        match self {
            EstimateField::Calories => "calories",
            EstimateField::ProteinG => "protein_g",
            EstimateField::CarbsG => "carbs_g",
            EstimateField::FatG => "fat_g",
            EstimateField::TotalDurationMinutes => "total_duration_minutes",
            EstimateField::EstimatedCaloriesBurned => "estimated_calories_burned",
        }
    }
}

impl fmt::Display for EstimateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown estimate field '{0}'")]
pub struct UnknownField(pub String);

impl FromStr for EstimateField {
    type Err = UnknownField;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "calories" => Ok(EstimateField::Calories),
            "protein_g" | "protein" => Ok(EstimateField::ProteinG),
            "carbs_g" | "carbs" => Ok(EstimateField::CarbsG),
            "fat_g" | "fat" => Ok(EstimateField::FatG),
            "total_duration_minutes" | "duration" | "duration_minutes" => {
                Ok(EstimateField::TotalDurationMinutes)
            }
            "estimated_calories_burned" | "calories_burned" => {
                Ok(EstimateField::EstimatedCaloriesBurned)
            }
            _ => Err(UnknownField(raw.to_string())),
        }
    }
}

/// Editable numeric estimate. Every field of the log kind has an entry;
/// `None` means "unknown" and is distinct from `Some(0.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    values: BTreeMap<EstimateField, Option<f64>>,
}

impl Estimate {
    pub fn unset(kind: LogKind) -> Self {
        Self {
            values: kind.fields().iter().map(|field| (*field, None)).collect(),
        }
    }

    pub fn get(&self, field: EstimateField) -> Option<f64> {
        self.values.get(&field).copied().flatten()
    }

    pub fn contains(&self, field: EstimateField) -> bool {
        self.values.contains_key(&field)
    }

    /// Returns false when `field` does not belong to this estimate.
    pub fn set(&mut self, field: EstimateField, value: Option<f64>) -> bool {
        match self.values.get_mut(&field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EstimateField, Option<f64>)> + '_ {
        self.values.iter().map(|(field, value)| (*field, *value))
    }
}

/// Structured estimate produced by a parse call.
///
/// Only the fields every log kind shares are typed; everything else (items,
/// exercises, totals, metadata) is kept verbatim in `body` so the original
/// result can be echoed back as `parsed_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub normalized_text: String,
    pub confidence: f64,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ParseResult {
    /// Read the editable numbers for `kind`, leaving absent or non-numeric
    /// values unset.
    pub fn estimate(&self, kind: LogKind) -> Estimate {
        let source = match kind.estimate_container() {
            Some(container) => self.body.get(container).and_then(Value::as_object),
            None => Some(&self.body),
        };
        let mut estimate = Estimate::unset(kind);
        if let Some(source) = source {
            for field in kind.fields() {
                estimate.set(*field, source.get(field.key()).and_then(Value::as_f64));
            }
        }
        estimate
    }

    /// `confidence` forced into `[0, 1]` for display. NaN reads as 0.
    pub fn clamped_confidence(&self) -> f64 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseResponse {
    pub parsed: ParseResult,
}

/// Body of `POST /logs/meals` and `POST /logs/workouts`.
#[derive(Debug, Clone, Serialize)]
pub struct LogCommitRequest {
    pub raw_text: String,
    pub parsed_data: ParseResult,
    pub confirmed_data: Value,
    pub logged_at: DateTime<Utc>,
}

/// The server's record of a committed log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogReceipt {
    pub id: String,
    #[serde(default, deserialize_with = "crate::time::option::deserialize")]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalCheckInRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalCheckIn {
    pub id: String,
    pub text: String,
    #[serde(deserialize_with = "crate::time::deserialize")]
    pub logged_at: DateTime<Utc>,
}
