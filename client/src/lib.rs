//! Client-side session layer for the Fitnesse coaching API.
//!
//! One [`CoachSession`] owns the shared pieces (transport, persisted
//! conversation ids, per-agent transcripts, aggregated app state) and hands
//! out exchanges, log workflows and the plan service that operate on them.

pub mod api;
pub mod app_state;
pub mod config;
pub mod conversation_cache;
pub mod error;
pub mod exchange;
pub mod handoff;
pub mod log_workflow;
pub mod plans;
pub mod session_store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::logs::{GoalCheckIn, LogKind};

pub use api::{CoachApi, HttpApi};
pub use app_state::{AppStateAggregator, Surface, SurfaceConfig};
pub use config::ClientConfig;
pub use conversation_cache::{ConversationCache, Delivery, ThreadMessage};
pub use error::{ClientError, ExchangeError, PlanError, WorkflowError};
pub use exchange::{ExchangeState, MessageExchange, Reconciled, SendOutcome};
pub use log_workflow::{ConfirmationForm, LogParseWorkflow, LogPhase, LogSnapshot};
pub use plans::PlanService;
pub use session_store::SessionStore;

/// Shared state for every conversational surface and workflow of one user.
pub struct CoachSession {
    api: Arc<dyn CoachApi>,
    cache: Arc<ConversationCache>,
    app_state: Arc<AppStateAggregator>,
}

impl CoachSession {
    /// Build a session talking HTTP to `config.api_url`.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let api: Arc<dyn CoachApi> = Arc::new(HttpApi::new(config)?);
        let sessions = Arc::new(SessionStore::open_or_memory(config.session_file.as_deref()));
        Ok(Self::with_api(api, sessions, config))
    }

    pub fn with_api(
        api: Arc<dyn CoachApi>,
        sessions: Arc<SessionStore>,
        config: &ClientConfig,
    ) -> Self {
        let cache = Arc::new(ConversationCache::new(api.clone(), sessions));
        let app_state = Arc::new(AppStateAggregator::new(api.clone(), config.state_ttl));
        Self {
            api,
            cache,
            app_state,
        }
    }

    pub fn api(&self) -> &Arc<dyn CoachApi> {
        &self.api
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.cache.sessions()
    }

    pub fn conversations(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    pub fn app_state(&self) -> &Arc<AppStateAggregator> {
        &self.app_state
    }

    /// Exchange for an explicit identity and lock mode.
    pub fn exchange(&self, identity: AgentIdentity, locked: bool) -> MessageExchange {
        MessageExchange::new(self.api.clone(), self.cache.clone(), identity, locked)
            .with_app_state(self.app_state.clone())
    }

    /// Exchange configured for `surface` from the current app state.
    pub async fn surface(&self, surface: Surface) -> Result<MessageExchange, ClientError> {
        let state = self.app_state.current().await?;
        let config = surface.configure(&state);
        tracing::debug!(
            %surface,
            identity = %config.identity,
            locked = config.locked,
            "opening surface"
        );
        let exchange = MessageExchange::for_surface(self.api.clone(), self.cache.clone(), config);
        Ok(exchange.with_app_state(self.app_state.clone()))
    }

    pub fn log_workflow(&self, kind: LogKind) -> LogParseWorkflow {
        LogParseWorkflow::new(kind, self.api.clone(), self.app_state.clone())
    }

    pub fn plans(&self) -> PlanService {
        PlanService::new(self.api.clone(), self.app_state.clone())
    }

    pub async fn check_in_goal(&self, text: &str) -> Result<GoalCheckIn, WorkflowError> {
        log_workflow::check_in_goal(self.api.as_ref(), &self.app_state, text).await
    }
}
