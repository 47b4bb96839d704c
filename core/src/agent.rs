use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four conversational roles. Each identity owns exactly one
/// conversation at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentIdentity {
    Onboarding,
    /// The backend calls this agent "coordination"; older clients sent "coordinator".
    #[serde(rename = "coordination", alias = "coordinator")]
    Coordinator,
    Nutritionist,
    Trainer,
}

impl AgentIdentity {
    pub const ALL: [AgentIdentity; 4] = [
        AgentIdentity::Onboarding,
        AgentIdentity::Coordinator,
        AgentIdentity::Nutritionist,
        AgentIdentity::Trainer,
    ];

    /// Wire name sent in `agent_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentIdentity::Onboarding => "onboarding",
            AgentIdentity::Coordinator => "coordination",
            AgentIdentity::Nutritionist => "nutritionist",
            AgentIdentity::Trainer => "trainer",
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent identity '{0}'")]
pub struct UnknownAgent(pub String);

impl FromStr for AgentIdentity {
    type Err = UnknownAgent;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onboarding" => Ok(AgentIdentity::Onboarding),
            "coordination" | "coordinator" => Ok(AgentIdentity::Coordinator),
            "nutritionist" => Ok(AgentIdentity::Nutritionist),
            "trainer" => Ok(AgentIdentity::Trainer),
            _ => Err(UnknownAgent(raw.to_string())),
        }
    }
}
