use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Server-side prompt rows. They can appear in stored history but are
    /// never part of the visible transcript.
    System,
}

/// A single transcript entry. Messages are append-only: once created they are
/// never reordered or edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(deserialize_with = "crate::time::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub agent_type: AgentIdentity,
}

/// Routing and side-effect hints attached to a chat reply.
///
/// `agent_type` stays a raw string: the server may name agents this client
/// does not know, and those must be logged and ignored, not adopted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_plan_generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_plan_generated: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatMetadata {
    /// Whether this reply may have changed plan existence or onboarding status.
    pub fn affects_app_state(&self) -> bool {
        self.plan_id.is_some()
            || self.meal_plan_generated == Some(true)
            || self.workout_plan_generated == Some(true)
            || self.onboarding_completed()
    }

    pub fn onboarding_completed(&self) -> bool {
        self.is_complete == Some(true)
    }
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub user_message: Message,
    pub assistant_message: Message,
    #[serde(default)]
    pub metadata: Option<ChatMetadata>,
}

/// Response of `GET /chat/conversations/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationMessages {
    #[serde(default)]
    pub messages: Vec<Message>,
}
