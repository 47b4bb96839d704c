use std::path::PathBuf;
use std::time::Duration;

pub const API_URL_ENV: &str = "FITNESSE_API_URL";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "FITNESSE_HTTP_TIMEOUT_SECS";
pub const STATE_TTL_SECS_ENV: &str = "FITNESSE_STATE_TTL_SECS";
pub const SESSION_FILE_ENV: &str = "FITNESSE_SESSION_FILE";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const HTTP_TIMEOUT_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS_MIN: u64 = 1;
const HTTP_TIMEOUT_SECS_MAX: u64 = 300;
const STATE_TTL_SECS: u64 = 30;
const STATE_TTL_SECS_MAX: u64 = 3600;

/// Runtime settings for a client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL that the `/chat`, `/state`, `/plans` and `/logs` paths hang off.
    pub api_url: String,
    pub http_timeout: Duration,
    /// How long a fetched AppState may be served before a refetch.
    pub state_ttl: Duration,
    /// Where conversation ids are persisted. `None` keeps them in memory only.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            state_ttl: Duration::from_secs(STATE_TTL_SECS),
            session_file: default_session_file(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let api_url = lookup(API_URL_ENV)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);
        let http_timeout = Duration::from_secs(parse_u64_with_bounds(
            lookup(HTTP_TIMEOUT_SECS_ENV),
            HTTP_TIMEOUT_SECS_MIN,
            HTTP_TIMEOUT_SECS_MAX,
            HTTP_TIMEOUT_SECS,
        ));
        let state_ttl = Duration::from_secs(parse_u64_with_bounds(
            lookup(STATE_TTL_SECS_ENV),
            0,
            STATE_TTL_SECS_MAX,
            STATE_TTL_SECS,
        ));
        let session_file = lookup(SESSION_FILE_ENV)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.session_file);

        Self {
            api_url: normalize_api_url(&api_url),
            http_timeout,
            state_ttl,
            session_file,
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = normalize_api_url(api_url);
        self
    }
}

pub fn default_session_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fitnesse").join("sessions.json"))
}

fn normalize_api_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_u64_with_bounds(raw: Option<String>, min: u64, max: u64, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .map(|parsed| parsed.clamp(min, max))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{
        API_URL_ENV, ClientConfig, HTTP_TIMEOUT_SECS_ENV, SESSION_FILE_ENV, STATE_TTL_SECS_ENV,
    };

    fn config_from(pairs: &[(&str, &str)]) -> ClientConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.api_url, "http://localhost:8000/api");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.state_ttl, Duration::from_secs(30));
    }

    #[test]
    fn env_values_are_bounded_and_trimmed() {
        let config = config_from(&[
            (API_URL_ENV, " https://coach.example.com/api/ "),
            (HTTP_TIMEOUT_SECS_ENV, "0"),
            (STATE_TTL_SECS_ENV, "999999"),
            (SESSION_FILE_ENV, "/tmp/fitnesse-sessions.json"),
        ]);
        assert_eq!(config.api_url, "https://coach.example.com/api");
        assert_eq!(config.http_timeout, Duration::from_secs(1));
        assert_eq!(config.state_ttl, Duration::from_secs(3600));
        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/fitnesse-sessions.json"))
        );
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = config_from(&[(STATE_TTL_SECS_ENV, "soon")]);
        assert_eq!(config.state_ttl, Duration::from_secs(30));
    }
}
