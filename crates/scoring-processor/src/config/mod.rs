use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_TOKEN_CACHE_SECS: u64 = 86_000;

/// Distinguishes runtime behavior for different stages of the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the processor.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub topics: TopicConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let telemetry = TelemetryConfig {
            log_level: var_or("LOG_LEVEL", "debug"),
            disabled: parse_flag("DISABLE_LOGGING")?,
        };

        let topics = TopicConfig {
            review_create: var_or("CREATE_DATA_TOPIC", "submission.notification.create"),
            review_update: var_or("UPDATE_DATA_TOPIC", "submission.notification.update"),
            autopilot_events: var_or("AUTOPILOT_EVENT_TOPIC", "notifications.autopilot.events"),
        };

        let upstream = UpstreamConfig {
            submission_api_url: trim_base(var_or(
                "SUBMISSION_API_URL",
                "http://localhost:3000/api/v5",
            )),
            challenge_api_url: trim_base(var_or(
                "CHALLENGE_API_URL",
                "https://api.topcoder-dev.com/v3/challenges",
            )),
        };

        let auth = AuthConfig {
            token_url: optional_var("AUTH0_URL"),
            audience: var_or("AUTH0_AUDIENCE", "https://www.topcoder.com"),
            client_id: optional_var("AUTH0_CLIENT_ID"),
            client_secret: optional_var("AUTH0_CLIENT_SECRET"),
            token_cache_time: parse_seconds("TOKEN_CACHE_TIME")?
                .unwrap_or(Duration::from_secs(DEFAULT_TOKEN_CACHE_SECS)),
        };

        let cache = CacheConfig {
            review_type_ttl: parse_seconds("REVIEW_TYPE_CACHE_TTL")?,
            scorecard_ttl: parse_seconds("SCORECARD_CACHE_TTL")?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry,
            topics,
            upstream,
            auth,
            cache,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_flag(key: &'static str) -> Result<bool, ConfigError> {
    match optional_var(key) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
    }
}

fn parse_seconds(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    optional_var(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidSeconds { key, value: raw })
        })
        .transpose()
}

/// Settings controlling the health and metrics HTTP binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub disabled: bool,
}

/// Names of the topics the processor subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub review_create: String,
    pub review_update: String,
    pub autopilot_events: String,
}

impl TopicConfig {
    pub fn subscriptions(&self) -> [&str; 3] {
        [
            self.review_create.as_str(),
            self.review_update.as_str(),
            self.autopilot_events.as_str(),
        ]
    }

    pub fn is_phase_topic(&self, topic: &str) -> bool {
        topic == self.autopilot_events
    }
}

/// Base URLs of the upstream APIs, without trailing slashes.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub submission_api_url: String,
    pub challenge_api_url: String,
}

/// Machine-to-machine credentials used against the submission API.
#[derive(Clone)]
pub struct AuthConfig {
    pub token_url: Option<String>,
    pub audience: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_cache_time: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_url", &self.token_url)
            .field("audience", &self.audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("token_cache_time", &self.token_cache_time)
            .finish()
    }
}

/// Expiry for the process-wide reference data caches. `None` keeps entries forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub review_type_ttl: Option<Duration>,
    pub scorecard_ttl: Option<Duration>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { key: &'static str, value: String },
    InvalidSeconds { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be a boolean, got '{value}'")
            }
            ConfigError::InvalidSeconds { key, value } => {
                write!(f, "{key} must be a whole number of seconds, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidSeconds { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "LOG_LEVEL",
            "DISABLE_LOGGING",
            "CREATE_DATA_TOPIC",
            "UPDATE_DATA_TOPIC",
            "AUTOPILOT_EVENT_TOPIC",
            "SUBMISSION_API_URL",
            "CHALLENGE_API_URL",
            "AUTH0_URL",
            "AUTH0_AUDIENCE",
            "AUTH0_CLIENT_ID",
            "AUTH0_CLIENT_SECRET",
            "TOKEN_CACHE_TIME",
            "REVIEW_TYPE_CACHE_TTL",
            "SCORECARD_CACHE_TTL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(!config.telemetry.disabled);
        assert_eq!(config.topics.review_create, "submission.notification.create");
        assert_eq!(config.topics.autopilot_events, "notifications.autopilot.events");
        assert_eq!(
            config.upstream.submission_api_url,
            "http://localhost:3000/api/v5"
        );
        assert!(config.auth.token_url.is_none());
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn reads_cache_ttls_and_trims_base_urls() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REVIEW_TYPE_CACHE_TTL", "600");
        env::set_var("SUBMISSION_API_URL", "http://submissions.local/api/v5/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.cache.review_type_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.cache.scorecard_ttl, None);
        assert_eq!(
            config.upstream.submission_api_url,
            "http://submissions.local/api/v5"
        );
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_ttl() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCORECARD_CACHE_TTL", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidSeconds { key, .. }) => assert_eq!(key, "SCORECARD_CACHE_TTL"),
            other => panic!("expected invalid seconds error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn phase_topic_is_recognized() {
        let topics = TopicConfig {
            review_create: "create".to_string(),
            review_update: "update".to_string(),
            autopilot_events: "autopilot".to_string(),
        };
        assert!(topics.is_phase_topic("autopilot"));
        assert!(!topics.is_phase_topic("create"));
        assert_eq!(topics.subscriptions(), ["create", "update", "autopilot"]);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }
}
