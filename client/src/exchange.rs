//! Chat send orchestration: optimistic echo, network call, reconciliation
//! against the server's answer, rollback on failure.
//!
//! Each send moves the submitting agent's thread through
//! `Idle → Sending → (reconciled | rolled back) → Idle`. Sends are serialized
//! per agent identity: a second submit while one is unresolved is rejected.
//! Different identities may send concurrently.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::chat::{ChatMetadata, ChatRequest, ChatResponse, Message, Role};
use uuid::Uuid;

use crate::api::CoachApi;
use crate::app_state::{AppStateAggregator, SurfaceConfig};
use crate::conversation_cache::{ConversationCache, Delivery, ThreadMessage};
use crate::error::{ClientError, ExchangeError};
use crate::handoff;
use crate::session_store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
}

/// Result of a send that reached the server.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Identity active when the message was submitted.
    pub agent: AgentIdentity,
    pub conversation_id: String,
    /// True when this send created the conversation.
    pub new_conversation: bool,
    /// Identity the exchange switched to, if the server handed off and the
    /// exchange is not locked.
    pub handoff: Option<AgentIdentity>,
    pub user_message: Message,
    pub assistant_message: Message,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Clone)]
pub enum SendOutcome {
    Reconciled(Reconciled),
    /// The send failed; the echo was removed and one error notice appended.
    RolledBack {
        agent: AgentIdentity,
        reason: String,
        /// HTTP status, if the server answered at all.
        status: Option<u16>,
    },
}

pub struct MessageExchange {
    api: Arc<dyn CoachApi>,
    cache: Arc<ConversationCache>,
    sessions: Arc<SessionStore>,
    app_state: Option<Arc<AppStateAggregator>>,
    locked: bool,
    active: Mutex<AgentIdentity>,
}

impl MessageExchange {
    pub fn new(
        api: Arc<dyn CoachApi>,
        cache: Arc<ConversationCache>,
        identity: AgentIdentity,
        locked: bool,
    ) -> Self {
        let sessions = cache.sessions().clone();
        Self {
            api,
            cache,
            sessions,
            app_state: None,
            locked,
            active: Mutex::new(identity),
        }
    }

    pub fn for_surface(
        api: Arc<dyn CoachApi>,
        cache: Arc<ConversationCache>,
        config: SurfaceConfig,
    ) -> Self {
        Self::new(api, cache, config.identity, config.locked)
    }

    /// Invalidate and refetch this aggregator after plan-affecting replies.
    pub fn with_app_state(mut self, app_state: Arc<AppStateAggregator>) -> Self {
        self.app_state = Some(app_state);
        self
    }

    pub fn active(&self) -> AgentIdentity {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// User-initiated navigation to another agent. Locked exchanges stay put.
    pub fn switch_to(&self, agent: AgentIdentity) -> bool {
        if self.locked {
            return false;
        }
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = agent;
        true
    }

    pub fn state(&self) -> ExchangeState {
        if self.cache.is_sending(self.active()) {
            ExchangeState::Sending
        } else {
            ExchangeState::Idle
        }
    }

    /// Load the active agent's transcript (history is fetched at most once).
    pub async fn load(&self) -> Result<Vec<ThreadMessage>, ClientError> {
        self.cache.load(self.active()).await
    }

    pub fn messages(&self) -> Vec<ThreadMessage> {
        self.cache.messages(self.active())
    }

    pub async fn submit(&self, content: &str) -> Result<SendOutcome, ExchangeError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ExchangeError::EmptyMessage);
        }

        let agent = self.active();
        let Some(mut slot) = self.cache.begin_send(agent) else {
            tracing::debug!(%agent, "rejecting submit while a send is in flight");
            return Err(ExchangeError::SendInFlight(agent));
        };

        let conversation_id = self.cache.conversation_id(agent);
        let local_id = format!("local-{}", Uuid::now_v7());
        self.cache.append(
            agent,
            [ThreadMessage {
                message: Message {
                    id: local_id.clone(),
                    role: Role::User,
                    content: content.to_string(),
                    created_at: Utc::now(),
                },
                delivery: Delivery::Pending,
            }],
        );
        slot.track_echo(&local_id);

        let request = ChatRequest {
            message: content.to_string(),
            conversation_id: conversation_id.clone(),
            agent_type: agent,
        };
        tracing::debug!(%agent, conversation_id = ?conversation_id, "sending chat message");
        let result = self.api.send_chat(&request).await;

        let outcome = match result {
            Ok(response) => {
                SendOutcome::Reconciled(self.reconcile(agent, conversation_id, &local_id, response))
            }
            Err(err) => self.roll_back(agent, conversation_id.as_deref(), &local_id, err),
        };
        drop(slot);

        if let (SendOutcome::Reconciled(reconciled), Some(app_state)) = (&outcome, &self.app_state)
        {
            if reconciled.metadata.onboarding_completed() {
                app_state.mark_onboarding_complete();
            }
            if reconciled.metadata.affects_app_state() {
                app_state.refresh_after_mutation().await;
            }
        }
        Ok(outcome)
    }

    fn reconcile(
        &self,
        agent: AgentIdentity,
        sent_conversation_id: Option<String>,
        local_id: &str,
        response: ChatResponse,
    ) -> Reconciled {
        let ChatResponse {
            conversation_id,
            user_message,
            assistant_message,
            metadata,
        } = response;
        let metadata = metadata.unwrap_or_default();
        let new_conversation = sent_conversation_id.as_deref() != Some(conversation_id.as_str());

        // Applied to the submitting agent's thread even if the user has since
        // moved to another agent.
        self.cache.reconcile(
            agent,
            &conversation_id,
            new_conversation,
            local_id,
            user_message.clone(),
            assistant_message.clone(),
        );

        if new_conversation {
            self.sessions.set(agent, &conversation_id);
            tracing::info!(%agent, %conversation_id, "started conversation");
        }

        let handoff = self.apply_handoff(agent, metadata.agent_type.as_deref());

        Reconciled {
            agent,
            conversation_id,
            new_conversation,
            handoff,
            user_message,
            assistant_message,
            metadata,
        }
    }

    fn apply_handoff(&self, agent: AgentIdentity, proposed: Option<&str>) -> Option<AgentIdentity> {
        let proposed = handoff::proposed_identity(proposed)?;
        if proposed == agent {
            return None;
        }
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if *active != agent {
            tracing::debug!(%agent, active = %*active, %proposed, "ignoring handoff for a thread no longer in view");
            return None;
        }
        let next = handoff::next_identity(self.locked, *active, proposed);
        if next == *active {
            tracing::debug!(%agent, %proposed, "handoff suppressed by lock mode");
            return None;
        }
        *active = next;
        tracing::info!(from = %agent, to = %next, "agent handoff");
        Some(next)
    }

    fn roll_back(
        &self,
        agent: AgentIdentity,
        conversation_id: Option<&str>,
        local_id: &str,
        err: ClientError,
    ) -> SendOutcome {
        tracing::warn!(%agent, error = %err, "chat send failed; rolling back");
        self.cache.remove_local(agent, local_id);
        if let (true, Some(conversation_id)) = (err.is_not_found(), conversation_id) {
            self.cache.forget(agent, conversation_id);
        }

        let reason = err.to_string();
        let status = err.status();
        self.cache.append(
            agent,
            [ThreadMessage {
                message: Message {
                    id: format!("local-error-{}", Uuid::now_v7()),
                    role: Role::Assistant,
                    content: failure_notice(&err),
                    created_at: Utc::now(),
                },
                delivery: Delivery::Failed,
            }],
        );
        SendOutcome::RolledBack {
            agent,
            reason,
            status,
        }
    }
}

fn failure_notice(err: &ClientError) -> String {
    match err {
        ClientError::NotFound { .. } => {
            "Sorry, that conversation has expired. Send your message again to start a new one."
                .to_string()
        }
        ClientError::Transport(_) => {
            "Sorry, I couldn't reach the server. Please try again.".to_string()
        }
        other => format!("Sorry, something went wrong: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fitnesse_core::agent::AgentIdentity;
    use fitnesse_core::chat::{ChatMetadata, Role};

    use super::{ExchangeState, MessageExchange, SendOutcome};
    use crate::app_state::AppStateAggregator;
    use crate::conversation_cache::{ConversationCache, Delivery};
    use crate::error::{ClientError, ExchangeError};
    use crate::session_store::SessionStore;
    use crate::test_support::{FakeApi, app_state, chat_response, message};

    struct Harness {
        api: Arc<FakeApi>,
        sessions: Arc<SessionStore>,
        cache: Arc<ConversationCache>,
    }

    impl Harness {
        fn new() -> Self {
            let api = Arc::new(FakeApi::default());
            let sessions = Arc::new(SessionStore::in_memory());
            let cache = Arc::new(ConversationCache::new(api.clone(), sessions.clone()));
            Self {
                api,
                sessions,
                cache,
            }
        }

        fn exchange(&self, agent: AgentIdentity, locked: bool) -> MessageExchange {
            MessageExchange::new(self.api.clone(), self.cache.clone(), agent, locked)
        }
    }

    fn ids(exchange: &MessageExchange) -> Vec<String> {
        exchange
            .messages()
            .into_iter()
            .map(|m| m.message.id)
            .collect()
    }

    #[tokio::test]
    async fn first_send_creates_and_persists_conversation() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response("conv-1", "hi", "Welcome!", Some("onboarding"))));
        let exchange = h.exchange(AgentIdentity::Onboarding, false);

        let outcome = exchange.submit("hi").await.unwrap();

        let SendOutcome::Reconciled(reconciled) = outcome else {
            panic!("expected reconciliation");
        };
        assert!(reconciled.new_conversation);
        assert_eq!(reconciled.handoff, None);
        assert_eq!(h.api.chat_requests()[0].conversation_id, None);
        assert_eq!(
            h.sessions.get(AgentIdentity::Onboarding).as_deref(),
            Some("conv-1")
        );
        assert_eq!(ids(&exchange), vec!["conv-1-u-hi", "conv-1-a-hi"]);
        assert!(
            exchange
                .messages()
                .iter()
                .all(|m| m.delivery == Delivery::Persisted)
        );
        assert_eq!(exchange.state(), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn later_sends_reuse_conversation_and_only_append() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response("conv-1", "one", "r1", Some("trainer"))));
        h.api.push_chat(Ok(chat_response("conv-1", "two", "r2", Some("trainer"))));
        let exchange = h.exchange(AgentIdentity::Trainer, true);

        exchange.submit("one").await.unwrap();
        let before = ids(&exchange);
        exchange.submit("two").await.unwrap();
        let after = ids(&exchange);

        assert_eq!(after[..before.len()], before[..]);
        assert_eq!(after.len(), 4);
        assert_eq!(
            h.api.chat_requests()[1].conversation_id.as_deref(),
            Some("conv-1")
        );
    }

    #[tokio::test]
    async fn optimistic_echo_is_visible_while_sending_and_second_submit_is_rejected() {
        let h = Harness::new();
        let gate = h.api.gate_chat();
        h.api.push_chat(Ok(chat_response("conv-n", "first", "ok", Some("nutritionist"))));
        let exchange = Arc::new(h.exchange(AgentIdentity::Nutritionist, true));

        let task = tokio::spawn({
            let exchange = exchange.clone();
            async move { exchange.submit("first").await }
        });
        while h.api.chat_requests().is_empty() {
            tokio::task::yield_now().await;
        }

        let pending = exchange.messages();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].delivery, Delivery::Pending);
        assert_eq!(pending[0].message.content, "first");
        assert_eq!(exchange.state(), ExchangeState::Sending);

        let rejected = exchange.submit("second").await;
        assert!(matches!(
            rejected,
            Err(ExchangeError::SendInFlight(AgentIdentity::Nutritionist))
        ));
        assert_eq!(exchange.messages(), pending);
        assert_eq!(h.api.chat_requests().len(), 1);

        gate.add_permits(1);
        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Reconciled(_)));
        assert_eq!(ids(&exchange), vec!["conv-n-u-first", "conv-n-a-first"]);
        assert_eq!(exchange.state(), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn abandoned_submit_leaves_no_echo_behind() {
        let h = Harness::new();
        let _gate = h.api.gate_chat();
        h.api.push_chat(Ok(chat_response("conv-t", "hi", "hey", Some("trainer"))));
        let exchange = h.exchange(AgentIdentity::Trainer, true);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), exchange.submit("hi")).await;

        assert!(timed_out.is_err());
        assert!(exchange.messages().is_empty());
        assert_eq!(exchange.state(), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn load_after_creating_send_uses_local_transcript() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response("conv-1", "hi", "Welcome!", Some("onboarding"))));
        h.api.push_history(Err(ClientError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
        }));
        let exchange = h.exchange(AgentIdentity::Onboarding, true);
        exchange.submit("hi").await.unwrap();

        let loaded = exchange.load().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(h.api.history_calls(), 0);
    }

    #[tokio::test]
    async fn different_agents_send_concurrently() {
        let h = Harness::new();
        let gate = h.api.gate_chat();
        h.api.push_chat(Ok(chat_response("conv-n", "meal", "noted", Some("nutritionist"))));
        h.api.push_chat(Ok(chat_response("conv-t", "run", "nice", Some("trainer"))));
        let nutrition = Arc::new(h.exchange(AgentIdentity::Nutritionist, true));
        let training = Arc::new(h.exchange(AgentIdentity::Trainer, true));

        let first = tokio::spawn({
            let nutrition = nutrition.clone();
            async move { nutrition.submit("meal").await }
        });
        while h.api.chat_requests().is_empty() {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let training = training.clone();
            async move { training.submit("run").await }
        });
        while h.api.chat_requests().len() < 2 {
            tokio::task::yield_now().await;
        }

        gate.add_permits(2);
        assert!(matches!(first.await.unwrap(), Ok(SendOutcome::Reconciled(_))));
        assert!(matches!(second.await.unwrap(), Ok(SendOutcome::Reconciled(_))));
        assert!(h.sessions.get(AgentIdentity::Nutritionist).is_some());
        assert!(h.sessions.get(AgentIdentity::Trainer).is_some());
    }

    #[tokio::test]
    async fn locked_exchange_ignores_server_handoff() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response(
            "conv-n",
            "log workout",
            "Switching you to our trainer...",
            Some("trainer"),
        )));
        let exchange = h.exchange(AgentIdentity::Nutritionist, true);

        let SendOutcome::Reconciled(reconciled) = exchange.submit("log workout").await.unwrap()
        else {
            panic!("expected reconciliation");
        };

        assert_eq!(reconciled.handoff, None);
        assert_eq!(exchange.active(), AgentIdentity::Nutritionist);
        assert_eq!(
            h.sessions.get(AgentIdentity::Nutritionist).as_deref(),
            Some("conv-n")
        );
    }

    #[tokio::test]
    async fn unlocked_exchange_follows_handoff_but_persists_under_submit_identity() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response(
            "conv-c",
            "log a meal",
            "Hi! I'm your nutritionist.",
            Some("nutritionist"),
        )));
        let exchange = h.exchange(AgentIdentity::Coordinator, false);

        let SendOutcome::Reconciled(reconciled) = exchange.submit("log a meal").await.unwrap()
        else {
            panic!("expected reconciliation");
        };

        assert_eq!(reconciled.handoff, Some(AgentIdentity::Nutritionist));
        assert_eq!(exchange.active(), AgentIdentity::Nutritionist);
        assert_eq!(
            h.sessions.get(AgentIdentity::Coordinator).as_deref(),
            Some("conv-c")
        );
        assert_eq!(h.sessions.get(AgentIdentity::Nutritionist), None);
        assert_eq!(h.cache.messages(AgentIdentity::Coordinator).len(), 2);
    }

    #[tokio::test]
    async fn unknown_agent_in_metadata_is_not_adopted() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response("conv-c", "hi", "hello", Some("analytics"))));
        let exchange = h.exchange(AgentIdentity::Coordinator, false);

        exchange.submit("hi").await.unwrap();
        assert_eq!(exchange.active(), AgentIdentity::Coordinator);
    }

    #[tokio::test]
    async fn response_lands_in_submitting_thread_after_navigation() {
        let h = Harness::new();
        let gate = h.api.gate_chat();
        h.api.push_chat(Ok(chat_response("conv-c", "hi", "hello", Some("coordination"))));
        let exchange = Arc::new(h.exchange(AgentIdentity::Coordinator, false));

        let task = tokio::spawn({
            let exchange = exchange.clone();
            async move { exchange.submit("hi").await }
        });
        while h.api.chat_requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(exchange.switch_to(AgentIdentity::Trainer));
        gate.add_permits(1);
        task.await.unwrap().unwrap();

        assert_eq!(exchange.active(), AgentIdentity::Trainer);
        assert!(exchange.messages().is_empty());
        assert_eq!(h.cache.messages(AgentIdentity::Coordinator).len(), 2);
    }

    #[tokio::test]
    async fn network_failure_rolls_back_to_single_error_notice() {
        let h = Harness::new();
        h.api.push_chat(Ok(chat_response("conv-t", "one", "r1", Some("trainer"))));
        h.api.push_chat(Err(ClientError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
        }));
        let exchange = h.exchange(AgentIdentity::Trainer, true);
        exchange.submit("one").await.unwrap();

        let outcome = exchange.submit("two").await.unwrap();

        let SendOutcome::RolledBack {
            agent,
            reason,
            status,
        } = outcome
        else {
            panic!("expected rollback");
        };
        assert_eq!(agent, AgentIdentity::Trainer);
        assert_eq!(status, Some(503));
        assert_eq!(reason, "Service Unavailable");
        let messages = exchange.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.delivery != Delivery::Pending));
        let notice = &messages[2];
        assert_eq!(notice.delivery, Delivery::Failed);
        assert_eq!(notice.message.role, Role::Assistant);
        assert!(notice.message.content.contains("Service Unavailable"));
        assert_eq!(
            h.sessions.get(AgentIdentity::Trainer).as_deref(),
            Some("conv-t")
        );
        assert_eq!(exchange.state(), ExchangeState::Idle);
    }

    #[tokio::test]
    async fn stale_conversation_on_send_restarts_on_next_send() {
        let h = Harness::new();
        h.sessions.set(AgentIdentity::Nutritionist, "conv-old");
        h.api.push_chat(Err(ClientError::NotFound {
            message: "Conversation not found".to_string(),
        }));
        h.api.push_chat(Ok(chat_response("conv-new", "again", "hi", Some("nutritionist"))));
        let exchange = h.exchange(AgentIdentity::Nutritionist, true);

        let outcome = exchange.submit("hello").await.unwrap();
        assert!(matches!(outcome, SendOutcome::RolledBack { .. }));
        assert_eq!(h.sessions.get(AgentIdentity::Nutritionist), None);

        exchange.submit("again").await.unwrap();
        let requests = h.api.chat_requests();
        assert_eq!(requests[0].conversation_id.as_deref(), Some("conv-old"));
        assert_eq!(requests[1].conversation_id, None);
        assert_eq!(
            h.sessions.get(AgentIdentity::Nutritionist).as_deref(),
            Some("conv-new")
        );
    }

    #[tokio::test]
    async fn history_not_found_then_send_creates_fresh_conversation() {
        let h = Harness::new();
        h.sessions.set(AgentIdentity::Trainer, "conv-x");
        h.api.push_history(Err(ClientError::NotFound {
            message: "Conversation not found".to_string(),
        }));
        h.api.push_chat(Ok(chat_response("conv-y", "hi", "hey", Some("trainer"))));
        let exchange = h.exchange(AgentIdentity::Trainer, true);

        assert!(exchange.load().await.unwrap().is_empty());
        assert_eq!(h.sessions.get(AgentIdentity::Trainer), None);

        let SendOutcome::Reconciled(reconciled) = exchange.submit("hi").await.unwrap() else {
            panic!("expected reconciliation");
        };
        assert!(reconciled.new_conversation);
        assert_eq!(h.api.chat_requests()[0].conversation_id, None);
        assert_eq!(
            h.sessions.get(AgentIdentity::Trainer).as_deref(),
            Some("conv-y")
        );
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_side_effects() {
        let h = Harness::new();
        let exchange = h.exchange(AgentIdentity::Coordinator, false);
        assert!(matches!(
            exchange.submit("   ").await,
            Err(ExchangeError::EmptyMessage)
        ));
        assert!(exchange.messages().is_empty());
        assert!(h.api.chat_requests().is_empty());
    }

    #[tokio::test]
    async fn plan_generation_reply_refetches_app_state() {
        let h = Harness::new();
        let mut response = chat_response(
            "conv-c",
            "make my meal plan",
            "Your meal plan is ready!",
            Some("nutritionist"),
        );
        response.metadata = Some(ChatMetadata {
            agent_type: Some("nutritionist".to_string()),
            plan_id: Some("plan-9".to_string()),
            meal_plan_generated: Some(true),
            ..ChatMetadata::default()
        });
        h.api.push_chat(Ok(response));
        h.api.push_state(Ok(app_state(true, true, false)));
        let aggregator = Arc::new(AppStateAggregator::new(
            h.api.clone(),
            Duration::from_secs(60),
        ));
        let exchange = h
            .exchange(AgentIdentity::Coordinator, false)
            .with_app_state(aggregator.clone());

        exchange.submit("make my meal plan").await.unwrap();

        assert_eq!(h.api.state_calls(), 1);
        assert!(aggregator.cached().await.unwrap().nutrition.has_plan);
    }

    #[tokio::test]
    async fn onboarding_completion_latches_even_if_state_lags() {
        let h = Harness::new();
        let mut response = chat_response("conv-o", "done", "Great!", Some("coordination"));
        response.metadata = Some(ChatMetadata {
            agent_type: Some("coordination".to_string()),
            is_complete: Some(true),
            ..ChatMetadata::default()
        });
        h.api.push_chat(Ok(response));
        h.api.push_state(Ok(app_state(false, false, false)));
        let aggregator = Arc::new(AppStateAggregator::new(
            h.api.clone(),
            Duration::from_secs(60),
        ));
        let exchange = h
            .exchange(AgentIdentity::Onboarding, false)
            .with_app_state(aggregator.clone());

        let SendOutcome::Reconciled(reconciled) = exchange.submit("done").await.unwrap() else {
            panic!("expected reconciliation");
        };

        assert_eq!(reconciled.handoff, Some(AgentIdentity::Coordinator));
        assert!(aggregator.cached().await.unwrap().onboarding_complete);
    }

    #[tokio::test]
    async fn server_message_values_replace_the_echo() {
        let h = Harness::new();
        let mut response = chat_response("conv-t", "ran 5k", "Nice work!", Some("trainer"));
        response.user_message = message("srv-1", Role::User, "ran 5k");
        h.api.push_chat(Ok(response));
        let exchange = h.exchange(AgentIdentity::Trainer, true);

        exchange.submit("  ran 5k  ").await.unwrap();

        let messages = exchange.messages();
        assert_eq!(messages[0].message, message("srv-1", Role::User, "ran 5k"));
        assert_eq!(h.api.chat_requests()[0].message, "ran 5k");
    }
}
