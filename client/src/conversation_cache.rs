//! In-memory transcript per agent, with history fetched at most once per
//! conversation id.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::chat::{Message, Role};
use tokio::sync::OnceCell;

use crate::api::CoachApi;
use crate::error::ClientError;
use crate::session_store::SessionStore;

/// Where a visible message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Authoritative server message.
    Persisted,
    /// Optimistic echo awaiting the server. Never persisted.
    Pending,
    /// Local notice that a send failed. Never persisted.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    pub message: Message,
    pub delivery: Delivery,
}

impl ThreadMessage {
    pub fn persisted(message: Message) -> Self {
        Self {
            message,
            delivery: Delivery::Persisted,
        }
    }
}

#[derive(Debug, Default)]
struct Thread {
    conversation_id: Option<String>,
    /// Conversation whose server history has been merged in.
    history_merged: Option<String>,
    messages: Vec<ThreadMessage>,
    sending: bool,
}

#[derive(Debug)]
enum HistoryFetch {
    Loaded(Vec<Message>),
    Missing,
}

pub struct ConversationCache {
    api: Arc<dyn CoachApi>,
    sessions: Arc<SessionStore>,
    threads: Mutex<HashMap<AgentIdentity, Thread>>,
    fetches: Mutex<HashMap<String, Arc<OnceCell<HistoryFetch>>>>,
}

impl ConversationCache {
    pub fn new(api: Arc<dyn CoachApi>, sessions: Arc<SessionStore>) -> Self {
        Self {
            api,
            sessions,
            threads: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Make `agent`'s transcript available, fetching server history for its
    /// persisted conversation the first time that id is seen.
    ///
    /// Repeated or concurrent calls for the same id share one fetch. A
    /// not-found answer drops the stale mapping and leaves an empty thread
    /// that the next send will create afresh; that is not an error.
    pub async fn load(&self, agent: AgentIdentity) -> Result<Vec<ThreadMessage>, ClientError> {
        let Some(conversation_id) = self.sessions.get(agent) else {
            return Ok(self.messages(agent));
        };
        if self.is_merged(agent, &conversation_id) {
            return Ok(self.messages(agent));
        }

        let cell = self.fetch_cell(&conversation_id);
        let fetched = cell
            .get_or_try_init(|| async {
                tracing::debug!(%agent, %conversation_id, "fetching conversation history");
                match self.api.conversation_messages(&conversation_id).await {
                    Ok(messages) => Ok(HistoryFetch::Loaded(messages)),
                    Err(err) if err.is_not_found() => Ok(HistoryFetch::Missing),
                    Err(err) => Err(err),
                }
            })
            .await?;

        match fetched {
            HistoryFetch::Loaded(history) => self.merge_history(agent, &conversation_id, history),
            HistoryFetch::Missing => {
                tracing::warn!(
                    %agent,
                    %conversation_id,
                    "conversation unknown to server; starting a new one"
                );
                self.forget(agent, &conversation_id);
            }
        }
        Ok(self.messages(agent))
    }

    /// Snapshot of the visible transcript.
    pub fn messages(&self, agent: AgentIdentity) -> Vec<ThreadMessage> {
        self.threads()
            .get(&agent)
            .map(|thread| thread.messages.clone())
            .unwrap_or_default()
    }

    /// Conversation the next send for `agent` continues, if any.
    pub fn conversation_id(&self, agent: AgentIdentity) -> Option<String> {
        let from_thread = self
            .threads()
            .get(&agent)
            .and_then(|thread| thread.conversation_id.clone());
        from_thread.or_else(|| self.sessions.get(agent))
    }

    pub fn is_sending(&self, agent: AgentIdentity) -> bool {
        self.threads().get(&agent).is_some_and(|thread| thread.sending)
    }

    /// Claim the single send slot for `agent`. `None` while another send for
    /// that agent is unresolved; callers must reject, not queue.
    pub(crate) fn begin_send(&self, agent: AgentIdentity) -> Option<SendSlot<'_>> {
        let mut threads = self.threads();
        let thread = threads.entry(agent).or_default();
        if thread.sending {
            return None;
        }
        thread.sending = true;
        Some(SendSlot {
            cache: self,
            agent,
            echo: None,
        })
    }

    pub fn append(&self, agent: AgentIdentity, messages: impl IntoIterator<Item = ThreadMessage>) {
        let mut threads = self.threads();
        let thread = threads.entry(agent).or_default();
        for message in messages {
            push_unique(&mut thread.messages, message);
        }
    }

    /// Remove a local-only message by id. Persisted messages are never removed.
    pub(crate) fn remove_local(&self, agent: AgentIdentity, local_id: &str) -> bool {
        let mut threads = self.threads();
        let Some(thread) = threads.get_mut(&agent) else {
            return false;
        };
        let before = thread.messages.len();
        thread.messages.retain(|entry| {
            entry.delivery == Delivery::Persisted || entry.message.id != local_id
        });
        thread.messages.len() != before
    }

    /// Swap the optimistic echo for the server's user and assistant messages,
    /// in that order, and bind the thread to `conversation_id`. `created`
    /// marks a conversation this send started, which has no earlier history.
    pub(crate) fn reconcile(
        &self,
        agent: AgentIdentity,
        conversation_id: &str,
        created: bool,
        local_id: &str,
        user_message: Message,
        assistant_message: Message,
    ) {
        let mut threads = self.threads();
        let thread = threads.entry(agent).or_default();
        thread
            .messages
            .retain(|entry| entry.delivery == Delivery::Persisted || entry.message.id != local_id);
        push_unique(&mut thread.messages, ThreadMessage::persisted(user_message));
        push_unique(&mut thread.messages, ThreadMessage::persisted(assistant_message));
        thread.conversation_id = Some(conversation_id.to_string());
        if created {
            thread.history_merged = Some(conversation_id.to_string());
        }
    }

    /// Drop a conversation id the server no longer recognises. Clears the
    /// persisted mapping only while it still points at that id.
    pub(crate) fn forget(&self, agent: AgentIdentity, conversation_id: &str) {
        if self.sessions.clear_if_matches(agent, conversation_id) {
            tracing::debug!(%agent, %conversation_id, "cleared stale session mapping");
        }
        let mut threads = self.threads();
        let thread = threads.entry(agent).or_default();
        let bound_elsewhere = thread
            .conversation_id
            .as_deref()
            .is_some_and(|current| current != conversation_id);
        if bound_elsewhere {
            return;
        }
        thread.conversation_id = None;
        thread.history_merged = None;
        thread
            .messages
            .retain(|entry| entry.delivery == Delivery::Pending);
    }

    fn merge_history(&self, agent: AgentIdentity, conversation_id: &str, history: &[Message]) {
        let mut threads = self.threads();
        let thread = threads.entry(agent).or_default();
        if thread.history_merged.as_deref() == Some(conversation_id) {
            return;
        }
        if thread
            .conversation_id
            .as_deref()
            .is_some_and(|current| current != conversation_id)
        {
            return;
        }

        let known: HashSet<&str> = history.iter().map(|m| m.id.as_str()).collect();
        let mut merged: Vec<ThreadMessage> = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .cloned()
            .map(ThreadMessage::persisted)
            .collect();
        merged.extend(
            thread
                .messages
                .drain(..)
                .filter(|entry| !known.contains(entry.message.id.as_str())),
        );
        thread.messages = merged;
        thread.conversation_id = Some(conversation_id.to_string());
        thread.history_merged = Some(conversation_id.to_string());
        tracing::debug!(%agent, %conversation_id, count = history.len(), "merged conversation history");
    }

    fn is_merged(&self, agent: AgentIdentity, conversation_id: &str) -> bool {
        self.threads()
            .get(&agent)
            .is_some_and(|thread| thread.history_merged.as_deref() == Some(conversation_id))
    }

    fn fetch_cell(&self, conversation_id: &str) -> Arc<OnceCell<HistoryFetch>> {
        let mut fetches = self.fetches.lock().unwrap_or_else(|e| e.into_inner());
        fetches
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<AgentIdentity, Thread>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Held for the lifetime of one send; releases the agent's slot on drop.
///
/// A tracked echo still `Pending` at drop time belongs to a send that was
/// abandoned before it resolved, so it is removed with the slot.
pub(crate) struct SendSlot<'a> {
    cache: &'a ConversationCache,
    agent: AgentIdentity,
    echo: Option<String>,
}

impl SendSlot<'_> {
    pub(crate) fn track_echo(&mut self, local_id: &str) {
        self.echo = Some(local_id.to_string());
    }
}

impl Drop for SendSlot<'_> {
    fn drop(&mut self) {
        let mut threads = self.cache.threads();
        let Some(thread) = threads.get_mut(&self.agent) else {
            return;
        };
        thread.sending = false;
        if let Some(local_id) = self.echo.as_deref() {
            thread.messages.retain(|entry| {
                entry.delivery != Delivery::Pending || entry.message.id != local_id
            });
        }
    }
}

fn push_unique(messages: &mut Vec<ThreadMessage>, entry: ThreadMessage) {
    let duplicate = entry.delivery == Delivery::Persisted
        && messages.iter().any(|existing| {
            existing.delivery == Delivery::Persisted && existing.message.id == entry.message.id
        });
    if !duplicate {
        messages.push(entry);
    }
}
