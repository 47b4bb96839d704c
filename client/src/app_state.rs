//! Consolidated state summary that gates chat lock mode and log availability.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fitnesse_core::agent::AgentIdentity;
use fitnesse_core::state::{AppState, PlanDomain};
use tokio::sync::{Mutex, RwLock};

use crate::api::CoachApi;
use crate::error::ClientError;

#[derive(Debug, Clone, Default)]
struct StateCache {
    state: Option<AppState>,
    fetched_at: Option<DateTime<Utc>>,
    generation: u64,
}

pub struct AppStateAggregator {
    api: Arc<dyn CoachApi>,
    ttl: Duration,
    cache: RwLock<StateCache>,
    /// Serializes refetches so concurrent readers share one request.
    refetch: Mutex<()>,
    /// Bumped by `invalidate`; a fetch started under an older generation is
    /// never considered fresh.
    generation: AtomicU64,
    onboarding_complete: AtomicBool,
}

impl AppStateAggregator {
    pub fn new(api: Arc<dyn CoachApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            cache: RwLock::new(StateCache::default()),
            refetch: Mutex::new(()),
            generation: AtomicU64::new(0),
            onboarding_complete: AtomicBool::new(false),
        }
    }

    /// Fetch from the server unconditionally and remember the result.
    pub async fn fetch(&self) -> Result<AppState, ClientError> {
        let generation = self.generation.load(Ordering::Acquire);
        let mut state = self.api.app_state().await?;
        self.apply_onboarding_latch(&mut state);

        let mut cache = self.cache.write().await;
        cache.state = Some(state.clone());
        cache.fetched_at = Some(Utc::now());
        cache.generation = generation;
        Ok(state)
    }

    /// Cached state while it is inside the staleness window, otherwise a
    /// refetch. If the refetch fails and an older value exists, that value is
    /// returned with a warning.
    pub async fn current(&self) -> Result<AppState, ClientError> {
        if let Some(state) = self.fresh().await {
            return Ok(state);
        }

        let _refetch = self.refetch.lock().await;
        if let Some(state) = self.fresh().await {
            return Ok(state);
        }

        match self.fetch().await {
            Ok(state) => Ok(state),
            Err(err) => match self.cached().await {
                Some(stale) => {
                    tracing::warn!(error = %err, "app state refetch failed; serving stale state");
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Mark the cached state as outdated after a mutation that may change
    /// plan existence, summaries or onboarding status.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("app state invalidated");
    }

    /// `invalidate` followed by `current`.
    pub async fn refresh(&self) -> Result<AppState, ClientError> {
        self.invalidate();
        self.current().await
    }

    /// Refetch after a mutation; a failure is logged, not returned, because
    /// the mutation itself already succeeded.
    pub async fn refresh_after_mutation(&self) {
        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "app state refetch after mutation failed");
        }
    }

    pub async fn cached(&self) -> Option<AppState> {
        let state = self.cache.read().await.state.clone()?;
        Some(self.latched(state))
    }

    pub async fn has_plan(&self, domain: PlanDomain) -> Result<bool, ClientError> {
        Ok(self.current().await?.has_plan(domain))
    }

    /// Record that onboarding finished (e.g. from chat metadata). Once set,
    /// no later fetch can report it as incomplete in this session.
    pub fn mark_onboarding_complete(&self) {
        if !self.onboarding_complete.swap(true, Ordering::AcqRel) {
            tracing::debug!("onboarding marked complete");
        }
    }

    fn apply_onboarding_latch(&self, state: &mut AppState) {
        if state.onboarding_complete {
            self.onboarding_complete.store(true, Ordering::Release);
        } else if self.onboarding_complete.load(Ordering::Acquire) {
            tracing::debug!("server still reports onboarding incomplete; keeping it complete");
            state.onboarding_complete = true;
        }
    }

    fn latched(&self, mut state: AppState) -> AppState {
        if self.onboarding_complete.load(Ordering::Acquire) {
            state.onboarding_complete = true;
        }
        state
    }

    async fn fresh(&self) -> Option<AppState> {
        let cache = self.cache.read().await;
        let fetched_at = cache.fetched_at?;
        if cache.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }
        let ttl =
            ChronoDuration::from_std(self.ttl).unwrap_or_else(|_| ChronoDuration::weeks(5200));
        if ttl <= ChronoDuration::zero() || Utc::now() - fetched_at >= ttl {
            return None;
        }
        cache.state.clone().map(|state| self.latched(state))
    }
}

/// A conversational surface of the app and how its exchange is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Main chat: follows server handoffs.
    Home,
    /// Nutrition page: pinned to the nutritionist.
    Nutrition,
    /// Training page: pinned to the trainer.
    Training,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub identity: AgentIdentity,
    pub locked: bool,
}

impl Surface {
    pub fn configure(self, state: &AppState) -> SurfaceConfig {
        match self {
            Surface::Home => SurfaceConfig {
                identity: if state.onboarding_complete {
                    AgentIdentity::Coordinator
                } else {
                    AgentIdentity::Onboarding
                },
                locked: false,
            },
            Surface::Nutrition => SurfaceConfig {
                identity: AgentIdentity::Nutritionist,
                locked: true,
            },
            Surface::Training => SurfaceConfig {
                identity: AgentIdentity::Trainer,
                locked: true,
            },
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Home => f.write_str("home"),
            Surface::Nutrition => f.write_str("nutrition"),
            Surface::Training => f.write_str("training"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown surface '{0}' (expected home, nutrition or training)")]
pub struct UnknownSurface(pub String);

impl FromStr for Surface {
    type Err = UnknownSurface;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Surface::Home),
            "nutrition" => Ok(Surface::Nutrition),
            "training" => Ok(Surface::Training),
            _ => Err(UnknownSurface(raw.to_string())),
        }
    }
}
