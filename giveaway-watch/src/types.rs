use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use interfaces::defs::{Alert, Post, Service, SessionError};

/// How many of the newest posts one poll cycle asks for.
pub const BATCH_SIZE: usize = 30;

pub const DEFAULT_SUBREDDIT: &str = "dogecoin";
pub const DEFAULT_AUTH_BASE_URL: &str = "https://www.reddit.com";
pub const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";

#[derive(Clone)]
pub struct RedditConfig {
    pub user_agent: String,
    pub subreddit: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
    pub auth_base_url: String,
    pub api_base_url: String,
}

impl fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditConfig")
            .field("user_agent", &self.user_agent)
            .field("subreddit", &self.subreddit)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("auth_base_url", &self.auth_base_url)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// First wait before rebuilding lost sessions; doubles up to `reconnect_max`.
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl WatchSettings {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            batch_size: BATCH_SIZE,
            reconnect_initial: Duration::from_secs(5),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Console,
    ConsoleAndFile(PathBuf),
}

/// Counters for one fetch-filter-notify pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub unseen: usize,
    pub qualified: usize,
    pub notified: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl WatchError {
    /// 2 for configuration, 3 and 4 for rejected feed and mail credentials.
    pub fn exit_code(&self) -> u8 {
        match self {
            WatchError::Config(_) | WatchError::InvalidUrl(_) => 2,
            WatchError::Session(SessionError::CredentialsRejected { service: Service::Feed, .. }) => 3,
            WatchError::Session(SessionError::CredentialsRejected { service: Service::Mail, .. }) => 4,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
