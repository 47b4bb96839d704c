use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::logs::{EstimateField, LogKind};
use fitnesse_core::state::PlanDomain;

/// Failure of a single API round-trip.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection, TLS or timeout failure in the transport.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server has no record of the requested resource (HTTP 404).
    #[error("{message}")]
    NotFound { message: String },
    /// Any other non-success status. `message` is the server's `detail` text.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request rejected locally: {0}")]
    Invalid(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// HTTP status if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound { .. } => Some(404),
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Why a chat submit did not start.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("a message to the {0} agent is already being sent")]
    SendInFlight(AgentIdentity),
    #[error("message is empty")]
    EmptyMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("another {0} log request is still in flight")]
    Busy(LogKind),
    #[error("no {0} plan yet; generate one before logging")]
    PlanRequired(PlanDomain),
    #[error("nothing to confirm; parse the log text first")]
    NothingToConfirm,
    #[error("log draft was cancelled")]
    Cancelled,
    #[error("log text must be between 1 and {max} characters")]
    InvalidText { max: usize },
    #[error("{field} is not part of a {kind} log")]
    UnknownField { kind: LogKind, field: EstimateField },
    #[error("{field} must be a non-negative number")]
    InvalidValue { field: EstimateField },
    #[error("{0}")]
    Api(#[from] ClientError),
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("duration_days must be between {min} and {max}, got {got}")]
    InvalidDuration { min: u32, max: u32, got: u32 },
    #[error("no {0} plan yet")]
    NoPlan(PlanDomain),
    #[error("{0}")]
    Api(#[from] ClientError),
}
