//! Client configuration from environment variables.
//!
//! # Environment Variables
//!
//! - `WORDGRID_SERVER_URL` (or `SERVER_WS_URL`) - Session server base URL (default: `ws://localhost:8000`)
//! - `WORDGRID_RETRY_MAX_ATTEMPTS` - Consecutive failed connections before giving up (default: 5)
//! - `WORDGRID_RETRY_BASE_DELAY_MS` - First reconnect delay (default: 1000)
//! - `WORDGRID_RETRY_MAX_DELAY_MS` - Reconnect delay cap (default: 10000)
//! - `WORDGRID_SETTLE_DELAY_MS` - Wait before reconnecting a restored session (default: 150)
//! - `WORDGRID_SESSION_CODE`, `WORDGRID_PLAYER_NAME`, `WORDGRID_AVATAR`, `WORDGRID_MODE` -
//!   Join without prompting

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use url::Url;
use wordgrid_shared::JoinMode;

use crate::infrastructure::websocket::RetryPolicy;
use crate::state::TransientTimings;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000";
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid server url {url:?}: {source}")]
    InvalidServerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("server url must use ws:// or wss://, got {0}://")]
    UnsupportedScheme(String),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: Url,
    pub retry: RetryPolicy,
    pub settle_delay: Duration,
    pub timings: TransientTimings,
    pub session_code: Option<String>,
    pub player_name: Option<String>,
    pub avatar: Option<String>,
    pub mode: JoinMode,
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns the raw value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get("WORDGRID_SERVER_URL")
            .or_else(|| get("SERVER_WS_URL"))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let server_url = parse_server_url(&raw_url)?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parsed_or(&get, "WORDGRID_RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            base_delay: millis_or(&get, "WORDGRID_RETRY_BASE_DELAY_MS", defaults.base_delay),
            max_delay: millis_or(&get, "WORDGRID_RETRY_MAX_DELAY_MS", defaults.max_delay),
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "WORDGRID_RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }
        if retry.max_delay < retry.base_delay {
            return Err(ConfigError::Invalid {
                key: "WORDGRID_RETRY_MAX_DELAY_MS",
                reason: "must not be smaller than WORDGRID_RETRY_BASE_DELAY_MS".into(),
            });
        }

        let mode = match get("WORDGRID_MODE") {
            Some(raw) => raw
                .parse::<JoinMode>()
                .map_err(|reason| ConfigError::Invalid {
                    key: "WORDGRID_MODE",
                    reason,
                })?,
            None => JoinMode::default(),
        };

        Ok(Self {
            server_url,
            retry,
            settle_delay: millis_or(&get, "WORDGRID_SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY),
            timings: TransientTimings::default(),
            session_code: get("WORDGRID_SESSION_CODE"),
            player_name: get("WORDGRID_PLAYER_NAME"),
            avatar: get("WORDGRID_AVATAR"),
            mode,
        })
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidServerUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parsed_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    let Some(raw) = get(key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting, using default");
            default
        }
    }
}

fn millis_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(parsed_or(get, key, default_ms))
}

/// Load `.env.local` then `.env` from `dir`, if present. Earlier files win.
pub fn load_dotenv(dir: &Path) {
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.server_url.as_str(), "ws://localhost:8000/");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.settle_delay, Duration::from_millis(150));
        assert_eq!(config.mode, JoinMode::Join);
        assert!(config.session_code.is_none());
    }

    #[test]
    fn test_overrides_and_fallback_key() {
        let config = config_from(&[
            ("SERVER_WS_URL", "wss://grid.example.com"),
            ("WORDGRID_RETRY_MAX_ATTEMPTS", "3"),
            ("WORDGRID_RETRY_BASE_DELAY_MS", "250"),
            ("WORDGRID_RETRY_MAX_DELAY_MS", "not-a-number"),
            ("WORDGRID_MODE", "create"),
            ("WORDGRID_PLAYER_NAME", "  Ada  "),
        ])
        .expect("config");
        assert_eq!(config.server_url.scheme(), "wss");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_delay, Duration::from_millis(10_000));
        assert_eq!(config.mode, JoinMode::Create);
        assert_eq!(config.player_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            config_from(&[("WORDGRID_SERVER_URL", "http://localhost:8000")]),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            config_from(&[("WORDGRID_SERVER_URL", "not a url")]),
            Err(ConfigError::InvalidServerUrl { .. })
        ));
        assert!(matches!(
            config_from(&[("WORDGRID_RETRY_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config_from(&[("WORDGRID_MODE", "spectate")]),
            Err(ConfigError::Invalid { key: "WORDGRID_MODE", .. })
        ));
    }
}
