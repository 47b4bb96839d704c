//! Transport seam: every remote operation the session layer consumes.

use async_trait::async_trait;
use chrono::NaiveDate;
use fitnesse_core::chat::{ChatRequest, ChatResponse, ConversationMessages, Message};
use fitnesse_core::error::ErrorBody;
use fitnesse_core::logs::{
    GoalCheckIn, GoalCheckInRequest, LogCommitRequest, LogKind, LogReceipt, ParseRequest,
    ParseResponse, ParseResult,
};
use fitnesse_core::plans::{PlanGenerateRequest, PlanGenerateSummary, PlanKind, PlanView};
use fitnesse_core::state::AppState;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ClientError;

#[async_trait]
pub trait CoachApi: Send + Sync {
    /// `POST /chat`
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;

    /// `GET /chat/conversations/{id}/messages`. 404 means the id is unknown.
    async fn conversation_messages(&self, conversation_id: &str)
    -> Result<Vec<Message>, ClientError>;

    /// `GET /state`
    async fn app_state(&self) -> Result<AppState, ClientError>;

    /// `POST /plans/{meal|workout}`
    async fn generate_plan(
        &self,
        kind: PlanKind,
        duration_days: u32,
    ) -> Result<PlanGenerateSummary, ClientError>;

    /// `GET /plans/{id}/view`
    async fn plan_view(
        &self,
        plan_id: &str,
        date: Option<NaiveDate>,
        include_detail: bool,
    ) -> Result<PlanView, ClientError>;

    /// `POST /logs/{meals|workouts}/parse`
    async fn parse_log(
        &self,
        kind: LogKind,
        request: &ParseRequest,
    ) -> Result<ParseResult, ClientError>;

    /// `POST /logs/{meals|workouts}`
    async fn commit_log(
        &self,
        kind: LogKind,
        request: &LogCommitRequest,
    ) -> Result<LogReceipt, ClientError>;

    /// `POST /logs/goals`
    async fn goal_checkin(&self, request: &GoalCheckInRequest)
    -> Result<GoalCheckIn, ClientError>;
}

/// reqwest-backed implementation of [`CoachApi`].
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.api_url)?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Invalid(format!(
                "API URL '{}' cannot carry paths",
                config.api_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append `path` and any extra segments to the base URL. Segments are
    /// percent-encoded, so ids can never escape their position.
    fn endpoint(&self, path: &str, ids: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            segments.extend(ids.iter().copied());
        }
        url
    }

    async fn call<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(%method, path = url.path(), "api request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        tracing::debug!(status = status.as_u16(), %message, "api request rejected");
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ClientError::NotFound { message })
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl CoachApi for HttpApi {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.call(Method::POST, self.endpoint("/chat", &[]), Some(request))
            .await
    }

    async fn conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ClientError> {
        let mut url = self.endpoint("/chat/conversations", &[conversation_id]);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("messages");
        }
        let body: ConversationMessages = self.call::<(), _>(Method::GET, url, None).await?;
        Ok(body.messages)
    }

    async fn app_state(&self) -> Result<AppState, ClientError> {
        self.call::<(), _>(Method::GET, self.endpoint("/state", &[]), None)
            .await
    }

    async fn generate_plan(
        &self,
        kind: PlanKind,
        duration_days: u32,
    ) -> Result<PlanGenerateSummary, ClientError> {
        let url = self.endpoint("/plans", &[kind.as_str()]);
        self.call(Method::POST, url, Some(&PlanGenerateRequest { duration_days }))
            .await
    }

    async fn plan_view(
        &self,
        plan_id: &str,
        date: Option<NaiveDate>,
        include_detail: bool,
    ) -> Result<PlanView, ClientError> {
        let mut url = self.endpoint("/plans", &[plan_id]);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("view");
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(date) = date {
                query.append_pair("date", &date.format("%Y-%m-%d").to_string());
            }
            query.append_pair("include_detail", if include_detail { "true" } else { "false" });
        }
        self.call::<(), _>(Method::GET, url, None).await
    }

    async fn parse_log(
        &self,
        kind: LogKind,
        request: &ParseRequest,
    ) -> Result<ParseResult, ClientError> {
        let body: ParseResponse = self
            .call(Method::POST, self.endpoint(kind.parse_path(), &[]), Some(request))
            .await?;
        Ok(body.parsed)
    }

    async fn commit_log(
        &self,
        kind: LogKind,
        request: &LogCommitRequest,
    ) -> Result<LogReceipt, ClientError> {
        self.call(Method::POST, self.endpoint(kind.commit_path(), &[]), Some(request))
            .await
    }

    async fn goal_checkin(&self, request: &GoalCheckInRequest) -> Result<GoalCheckIn, ClientError> {
        self.call(Method::POST, self.endpoint("/logs/goals", &[]), Some(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::HttpApi;
    use crate::config::ClientConfig;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(&ClientConfig::default().with_api_url(base)).unwrap()
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let api = api("http://localhost:8000/api");
        assert_eq!(
            api.endpoint("/logs/meals/parse", &[]).as_str(),
            "http://localhost:8000/api/logs/meals/parse"
        );
    }

    #[test]
    fn endpoint_encodes_ids_as_single_segments() {
        let api = api("http://localhost:8000/api/");
        assert_eq!(
            api.endpoint("/chat/conversations", &["a/b c"]).as_str(),
            "http://localhost:8000/api/chat/conversations/a%2Fb%20c"
        );
    }

    #[test]
    fn base_without_path_works() {
        let api = api("https://coach.example.com");
        assert_eq!(
            api.endpoint("/state", &[]).as_str(),
            "https://coach.example.com/state"
        );
    }

    #[test]
    fn non_hierarchical_base_is_rejected() {
        let config = ClientConfig::default().with_api_url("mailto:coach@example.com");
        assert!(HttpApi::new(&config).is_err());
    }
}
