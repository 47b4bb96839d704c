//! Scripted in-memory `CoachApi` used by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use fitnesse_core::chat::{ChatMetadata, ChatRequest, ChatResponse, Message, Role};
use fitnesse_core::logs::{
    GoalCheckIn, GoalCheckInRequest, LogCommitRequest, LogKind, LogReceipt, ParseRequest,
    ParseResult,
};
use fitnesse_core::plans::{PlanGenerateSummary, PlanKind, PlanView};
use fitnesse_core::state::{AppState, SectionState};
use tokio::sync::Semaphore;

use crate::api::CoachApi;
use crate::error::ClientError;

type Queue<T> = Mutex<VecDeque<Result<T, ClientError>>>;

#[derive(Default)]
pub struct FakeApi {
    chat: Queue<ChatResponse>,
    history: Queue<Vec<Message>>,
    state: Queue<AppState>,
    plans: Queue<PlanGenerateSummary>,
    views: Queue<PlanView>,
    parses: Queue<ParseResult>,
    commits: Queue<LogReceipt>,
    goals: Queue<GoalCheckIn>,
    chat_gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Calls>,
}

#[derive(Default)]
struct Calls {
    chat: Vec<ChatRequest>,
    history: usize,
    state: usize,
    plans: Vec<(PlanKind, u32)>,
    views: Vec<(String, Option<NaiveDate>, bool)>,
    parses: Vec<(LogKind, ParseRequest)>,
    commits: Vec<(LogKind, LogCommitRequest)>,
    goals: Vec<GoalCheckInRequest>,
}

fn pop<T>(queue: &Queue<T>, what: &str) -> Result<T, ClientError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| {
            Err(ClientError::Status {
                status: 500,
                message: format!("no scripted {what} response"),
            })
        })
}

impl FakeApi {
    pub fn push_chat(&self, response: Result<ChatResponse, ClientError>) {
        self.chat.lock().unwrap().push_back(response);
    }

    pub fn push_history(&self, response: Result<Vec<Message>, ClientError>) {
        self.history.lock().unwrap().push_back(response);
    }

    pub fn push_state(&self, response: Result<AppState, ClientError>) {
        self.state.lock().unwrap().push_back(response);
    }

    pub fn push_plan(&self, response: Result<PlanGenerateSummary, ClientError>) {
        self.plans.lock().unwrap().push_back(response);
    }

    pub fn push_view(&self, response: Result<PlanView, ClientError>) {
        self.views.lock().unwrap().push_back(response);
    }

    pub fn push_parse(&self, response: Result<ParseResult, ClientError>) {
        self.parses.lock().unwrap().push_back(response);
    }

    pub fn push_commit(&self, response: Result<LogReceipt, ClientError>) {
        self.commits.lock().unwrap().push_back(response);
    }

    pub fn push_goal(&self, response: Result<GoalCheckIn, ClientError>) {
        self.goals.lock().unwrap().push_back(response);
    }

    /// Hold every chat send until a permit is added to the returned semaphore.
    pub fn gate_chat(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.chat_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().chat.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.calls.lock().unwrap().history
    }

    pub fn state_calls(&self) -> usize {
        self.calls.lock().unwrap().state
    }

    pub fn plan_requests(&self) -> Vec<(PlanKind, u32)> {
        self.calls.lock().unwrap().plans.clone()
    }

    pub fn view_requests(&self) -> Vec<(String, Option<NaiveDate>, bool)> {
        self.calls.lock().unwrap().views.clone()
    }

    pub fn parse_requests(&self) -> Vec<(LogKind, ParseRequest)> {
        self.calls.lock().unwrap().parses.clone()
    }

    pub fn commit_requests(&self) -> Vec<(LogKind, LogCommitRequest)> {
        self.calls.lock().unwrap().commits.clone()
    }

    pub fn goal_requests(&self) -> Vec<GoalCheckInRequest> {
        self.calls.lock().unwrap().goals.clone()
    }
}

#[async_trait]
impl CoachApi for FakeApi {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.calls.lock().unwrap().chat.push(request.clone());
        let gate = self.chat_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("chat gate closed").forget();
        }
        pop(&self.chat, "chat")
    }

    async fn conversation_messages(
        &self,
        _conversation_id: &str,
    ) -> Result<Vec<Message>, ClientError> {
        self.calls.lock().unwrap().history += 1;
        tokio::task::yield_now().await;
        pop(&self.history, "history")
    }

    async fn app_state(&self) -> Result<AppState, ClientError> {
        self.calls.lock().unwrap().state += 1;
        pop(&self.state, "state")
    }

    async fn generate_plan(
        &self,
        kind: PlanKind,
        duration_days: u32,
    ) -> Result<PlanGenerateSummary, ClientError> {
        self.calls.lock().unwrap().plans.push((kind, duration_days));
        pop(&self.plans, "plan")
    }

    async fn plan_view(
        &self,
        plan_id: &str,
        date: Option<NaiveDate>,
        include_detail: bool,
    ) -> Result<PlanView, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .views
            .push((plan_id.to_string(), date, include_detail));
        pop(&self.views, "view")
    }

    async fn parse_log(
        &self,
        kind: LogKind,
        request: &ParseRequest,
    ) -> Result<ParseResult, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .parses
            .push((kind, request.clone()));
        pop(&self.parses, "parse")
    }

    async fn commit_log(
        &self,
        kind: LogKind,
        request: &LogCommitRequest,
    ) -> Result<LogReceipt, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .commits
            .push((kind, request.clone()));
        pop(&self.commits, "commit")
    }

    async fn goal_checkin(&self, request: &GoalCheckInRequest) -> Result<GoalCheckIn, ClientError> {
        self.calls.lock().unwrap().goals.push(request.clone());
        pop(&self.goals, "goal")
    }
}

pub fn message(id: &str, role: Role, content: &str) -> Message {
    Message {
        id: id.to_string(),
        role,
        content: content.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 4, 8, 30, 0).unwrap(),
    }
}

pub fn chat_response(
    conversation_id: &str,
    user_text: &str,
    reply: &str,
    agent_type: Option<&str>,
) -> ChatResponse {
    ChatResponse {
        conversation_id: conversation_id.to_string(),
        user_message: message(&format!("{conversation_id}-u-{user_text}"), Role::User, user_text),
        assistant_message: message(&format!("{conversation_id}-a-{user_text}"), Role::Assistant, reply),
        metadata: Some(ChatMetadata {
            agent_type: agent_type.map(str::to_string),
            ..ChatMetadata::default()
        }),
    }
}

pub fn app_state(onboarding_complete: bool, nutrition_plan: bool, training_plan: bool) -> AppState {
    let section = |has_plan: bool, plan_id: &str| SectionState {
        has_plan,
        plan_id: has_plan.then(|| plan_id.to_string()),
        summary: None,
    };
    AppState {
        user_id: "temp-user-123".to_string(),
        onboarding_complete,
        nutrition: section(nutrition_plan, "meal-plan-1"),
        training: section(training_plan, "workout-plan-1"),
    }
}
