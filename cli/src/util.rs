use std::io::Write;

use fitnesse_client::{ClientError, PlanError, WorkflowError};
use fitnesse_core::state::PlanDomain;
use serde::Serialize;
use serde_json::json;

/// Exit codes: 0=success, 1=client error (4xx or rejected operation),
/// 2=server error (5xx), 3=connection error, 4=usage error
pub const EXIT_OK: i32 = 0;
pub const EXIT_CLIENT: i32 = 1;
pub const EXIT_SERVER: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;
pub const EXIT_USAGE: i32 = 4;

fn to_pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn exit_error(message: &str, docs_hint: Option<&str>, code: i32) -> ! {
    eprintln!("{}", to_pretty(&error_body("cli_error", message, docs_hint)));
    std::process::exit(code);
}

fn error_body(error: &str, message: &str, docs_hint: Option<&str>) -> serde_json::Value {
    let mut err = json!({
        "error": error,
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    err
}

/// Print a structured error on stderr and return the exit code to use.
pub fn report(error: &str, message: &str, docs_hint: Option<&str>, code: i32) -> i32 {
    eprintln!("{}", to_pretty(&error_body(error, message, docs_hint)));
    code
}

pub fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_value(value) {
        Ok(value) => {
            println!("{}", to_pretty(&value));
            EXIT_OK
        }
        Err(err) => report(
            "cli_error",
            &format!("failed to encode output: {err}"),
            None,
            EXIT_SERVER,
        ),
    }
}

/// Exit code for an HTTP status the server answered with.
pub fn status_exit_code(status: Option<u16>) -> i32 {
    match status {
        None => EXIT_CONNECTION,
        Some(200..=299) => EXIT_OK,
        Some(400..=499) => EXIT_CLIENT,
        Some(_) => EXIT_SERVER,
    }
}

pub fn client_error_code(err: &ClientError) -> i32 {
    match err {
        ClientError::Transport(_) if err.status().is_none() => EXIT_CONNECTION,
        ClientError::Transport(_) | ClientError::NotFound { .. } | ClientError::Status { .. } => {
            status_exit_code(err.status())
        }
        ClientError::Decode(_) => EXIT_SERVER,
        ClientError::Url(_) | ClientError::Invalid(_) => EXIT_USAGE,
    }
}

pub fn report_client_error(err: &ClientError) -> i32 {
    let code = client_error_code(err);
    let (error, hint) = match code {
        EXIT_CONNECTION => (
            "connection_error",
            Some("Is the API server running? Check FITNESSE_API_URL."),
        ),
        EXIT_USAGE => ("cli_error", None),
        _ => ("api_error", None),
    };
    report(error, &err.to_string(), hint, code)
}

pub fn report_workflow_error(err: &WorkflowError) -> i32 {
    match err {
        WorkflowError::Api(err) => report_client_error(err),
        WorkflowError::PlanRequired(domain) => report(
            "plan_required",
            &err.to_string(),
            Some(match domain {
                PlanDomain::Nutrition => "Run `fitnesse plan generate meal`",
                PlanDomain::Training => "Run `fitnesse plan generate workout`",
            }),
            EXIT_CLIENT,
        ),
        WorkflowError::InvalidText { .. }
        | WorkflowError::UnknownField { .. }
        | WorkflowError::InvalidValue { .. } => {
            report("cli_error", &err.to_string(), None, EXIT_USAGE)
        }
        WorkflowError::Busy(_) | WorkflowError::NothingToConfirm | WorkflowError::Cancelled => {
            report("workflow_error", &err.to_string(), None, EXIT_CLIENT)
        }
    }
}

pub fn report_plan_error(err: &PlanError) -> i32 {
    match err {
        PlanError::Api(err) => report_client_error(err),
        PlanError::InvalidDuration { .. } => {
            report("cli_error", &err.to_string(), None, EXIT_USAGE)
        }
        PlanError::NoPlan(_) => report(
            "plan_required",
            &err.to_string(),
            Some("Generate one with `fitnesse plan generate`"),
            EXIT_CLIENT,
        ),
    }
}

/// Ask a yes/no question on stderr and read the answer from stdin.
pub fn confirm_prompt(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => is_affirmative(&answer),
        Err(_) => false,
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
