use clap::{Args, Subcommand};
use fitnesse_client::{CoachSession, LogParseWorkflow, LogSnapshot};
use fitnesse_core::logs::{EstimateField, LogKind};
use serde_json::json;

use crate::util::{confirm_prompt, print_json, report_workflow_error};

#[derive(Subcommand)]
pub enum LogCommands {
    /// Parse a meal description, review the estimate, then save it
    Meal(LogArgs),
    /// Parse a workout description, review the estimate, then save it
    Workout(LogArgs),
    /// Record a goal check-in
    Goal {
        /// Check-in text
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Args)]
pub struct LogArgs {
    /// What you ate or did, in your own words
    #[arg(required = true)]
    text: Vec<String>,
    /// Override estimated calories (meal)
    #[arg(long)]
    calories: Option<f64>,
    /// Override protein in grams (meal)
    #[arg(long)]
    protein_g: Option<f64>,
    /// Override carbohydrates in grams (meal)
    #[arg(long)]
    carbs_g: Option<f64>,
    /// Override fat in grams (meal)
    #[arg(long)]
    fat_g: Option<f64>,
    /// Override total duration in minutes (workout)
    #[arg(long)]
    duration_minutes: Option<f64>,
    /// Override estimated calories burned (workout)
    #[arg(long)]
    calories_burned: Option<f64>,
    /// Mark a field as unknown instead of using the estimate (repeatable)
    #[arg(long, value_name = "FIELD")]
    unset: Vec<EstimateField>,
    /// Replace the normalized description
    #[arg(long)]
    normalized_text: Option<String>,
    /// Save without asking for confirmation
    #[arg(long, conflicts_with = "cancel")]
    yes: bool,
    /// Parse and review only; nothing is saved
    #[arg(long)]
    cancel: bool,
}

impl LogArgs {
    /// Field edits in the order they are applied: overrides, then unsets.
    fn edits(&self) -> Vec<(EstimateField, Option<f64>)> {
        let overrides = [
            (EstimateField::Calories, self.calories),
            (EstimateField::ProteinG, self.protein_g),
            (EstimateField::CarbsG, self.carbs_g),
            (EstimateField::FatG, self.fat_g),
            (EstimateField::TotalDurationMinutes, self.duration_minutes),
            (EstimateField::EstimatedCaloriesBurned, self.calories_burned),
        ];
        overrides
            .into_iter()
            .filter_map(|(field, value)| value.map(|value| (field, Some(value))))
            .chain(self.unset.iter().map(|field| (*field, None)))
            .collect()
    }
}

pub async fn run(session: &CoachSession, command: LogCommands) -> i32 {
    match command {
        LogCommands::Meal(args) => log(session.log_workflow(LogKind::Meal), &args).await,
        LogCommands::Workout(args) => log(session.log_workflow(LogKind::Workout), &args).await,
        LogCommands::Goal { text } => match session.check_in_goal(&text.join(" ")).await {
            Ok(checkin) => print_json(&checkin),
            Err(err) => report_workflow_error(&err),
        },
    }
}

async fn log(workflow: LogParseWorkflow, args: &LogArgs) -> i32 {
    if let Err(err) = workflow.submit(&args.text.join(" ")).await {
        return report_workflow_error(&err);
    }
    for (field, value) in args.edits() {
        if let Err(err) = workflow.edit(field, value) {
            return report_workflow_error(&err);
        }
    }
    if let Some(text) = args.normalized_text.as_deref() {
        if let Err(err) = workflow.edit_normalized_text(text) {
            return report_workflow_error(&err);
        }
    }

    let review = review_json(workflow.kind(), &workflow.snapshot());
    if args.cancel {
        return discard(&workflow, review, "cancelled");
    }
    if !args.yes {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&review).unwrap_or_else(|_| review.to_string())
        );
        if !confirm_prompt("Save this log?") {
            return discard(&workflow, review, "discarded");
        }
    }

    match workflow.confirm().await {
        Ok(receipt) => print_json(&json!({
            "status": "committed",
            "review": review,
            "receipt": receipt,
        })),
        Err(err) => report_workflow_error(&err),
    }
}

fn discard(workflow: &LogParseWorkflow, review: serde_json::Value, status: &str) -> i32 {
    if let Err(err) = workflow.cancel() {
        return report_workflow_error(&err);
    }
    print_json(&json!({"status": status, "review": review}))
}

/// What the user is asked to confirm: the editable form plus the parser's
/// confidence and follow-up questions.
fn review_json(kind: LogKind, snapshot: &LogSnapshot) -> serde_json::Value {
    let estimate: serde_json::Map<String, serde_json::Value> = snapshot
        .form
        .iter()
        .flat_map(|form| form.estimate.iter())
        .map(|(field, value)| (field.key().to_string(), json!(value)))
        .collect();
    let parsed = snapshot.parsed.as_ref();
    json!({
        "kind": kind,
        "raw_text": snapshot.raw_text,
        "normalized_text": snapshot.form.as_ref().map(|form| form.normalized_text.as_str()),
        "estimate": estimate,
        "confidence": snapshot.form.as_ref().map(|form| form.confidence),
        "questions": parsed.map(|parsed| parsed.questions.clone()).unwrap_or_default(),
    })
}
