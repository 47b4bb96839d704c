//! Whether a server-proposed agent switch is honored.

use fitnesse_core::agent::AgentIdentity;

/// Locked surfaces keep their identity; unlocked ones follow the server.
pub fn next_identity(locked: bool, current: AgentIdentity, proposed: AgentIdentity) -> AgentIdentity {
    match (locked, proposed) {
        (true, _) => current,
        (
            false,
            AgentIdentity::Onboarding
            | AgentIdentity::Coordinator
            | AgentIdentity::Nutritionist
            | AgentIdentity::Trainer,
        ) => proposed,
    }
}

/// Interpret `metadata.agent_type`. Unrecognized names are logged and
/// treated as "no proposal" rather than adopted.
pub fn proposed_identity(raw: Option<&str>) -> Option<AgentIdentity> {
    let raw = raw?;
    match raw.parse::<AgentIdentity>() {
        Ok(agent) => Some(agent),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring agent handoff to unknown identity");
            None
        }
    }
}
