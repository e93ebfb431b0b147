//! Settings file loading.
//!
//! The file is TOML with four tables:
//!
//! ```toml
//! [bot]
//! agent_identity = "giveaway-watch/0.1 by u/someone"
//! poll_interval_seconds = 60
//! subreddit = "dogecoin"
//!
//! [log]
//! verbosity = 1            # 0 = console only, 1 = console + file
//! file_path = "giveaway-watch.log"
//!
//! [email]
//! from_address = "bot@gmail.com"
//! to_address = "me@example.com"
//! password = "app-password"
//!
//! [reddit]
//! client_id = "..."
//! client_secret = "..."
//! username = "..."
//! password = "..."
//! ```
//!
//! Everything is validated once, up front. The resulting [`Config`] is never
//! mutated afterwards.

use crate::types::{
    ConfigError, LogTarget, RedditConfig, WatchSettings, DEFAULT_API_BASE_URL,
    DEFAULT_AUTH_BASE_URL, DEFAULT_SUBREDDIT,
};
use email_alerts::{validate_address, SmtpConfig, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct RawConfig {
    bot: BotSection,
    #[serde(default)]
    log: LogSection,
    email: EmailSection,
    reddit: RedditSection,
}

#[derive(Debug, Deserialize)]
struct BotSection {
    agent_identity: Option<String>,
    poll_interval_seconds: Option<i64>,
    subreddit: Option<String>,
    reconnect_delay_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    verbosity: Option<u8>,
    file_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct EmailSection {
    from_address: Option<String>,
    to_address: Option<String>,
    password: Option<String>,
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RedditSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    request_timeout_seconds: Option<u64>,
    auth_base_url: Option<String>,
    api_base_url: Option<String>,
}

/// Values supplied outside the file, typically from the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub mail_password: Option<String>,
    pub reddit_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub watch: WatchSettings,
    pub log: LogTarget,
    pub reddit: RedditConfig,
    pub smtp: SmtpConfig,
    pub mail_from: String,
    pub mail_to: String,
}

impl Config {
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, overrides)
    }

    pub fn parse(text: &str, overrides: &Overrides) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::validate(raw, overrides)
    }

    pub fn subreddit(&self) -> &str {
        &self.reddit.subreddit
    }

    fn validate(raw: RawConfig, overrides: &Overrides) -> Result<Self, ConfigError> {
        let agent_identity = required(raw.bot.agent_identity, "bot.agent_identity")?;

        let interval = raw
            .bot
            .poll_interval_seconds
            .ok_or(ConfigError::Missing("bot.poll_interval_seconds"))?;
        if interval <= 0 {
            return Err(ConfigError::Invalid {
                field: "bot.poll_interval_seconds",
                reason: format!("must be greater than zero, got {}", interval),
            });
        }

        let subreddit = raw
            .bot
            .subreddit
            .map(|s| s.trim().trim_start_matches("/r/").trim_start_matches("r/").to_string())
            .unwrap_or_else(|| DEFAULT_SUBREDDIT.to_string());
        if subreddit.is_empty() || subreddit.contains('/') {
            return Err(ConfigError::Invalid {
                field: "bot.subreddit",
                reason: format!("'{}' is not a subreddit name", subreddit),
            });
        }

        let log = match raw.log.verbosity.unwrap_or(0) {
            0 => LogTarget::Console,
            1 => LogTarget::ConsoleAndFile(
                raw.log.file_path.ok_or(ConfigError::Missing("log.file_path"))?,
            ),
            other => {
                return Err(ConfigError::Invalid {
                    field: "log.verbosity",
                    reason: format!("expected 0 or 1, got {}", other),
                })
            }
        };

        let mail_from = required(raw.email.from_address, "email.from_address")?;
        let mail_to = required(raw.email.to_address, "email.to_address")?;
        validate_address(&mail_from).map_err(|reason| ConfigError::Invalid {
            field: "email.from_address",
            reason,
        })?;
        validate_address(&mail_to).map_err(|reason| ConfigError::Invalid {
            field: "email.to_address",
            reason,
        })?;
        let mail_password = required(
            overrides.mail_password.clone().or(raw.email.password),
            "email.password",
        )?;

        let timeout_seconds = raw.reddit.request_timeout_seconds.unwrap_or(30);
        let auth_base_url = base_url(raw.reddit.auth_base_url, DEFAULT_AUTH_BASE_URL, "reddit.auth_base_url")?;
        let api_base_url = base_url(raw.reddit.api_base_url, DEFAULT_API_BASE_URL, "reddit.api_base_url")?;

        let reddit = RedditConfig {
            user_agent: agent_identity,
            subreddit,
            client_id: required(raw.reddit.client_id, "reddit.client_id")?,
            client_secret: required(raw.reddit.client_secret, "reddit.client_secret")?,
            username: required(raw.reddit.username, "reddit.username")?,
            password: required(
                overrides.reddit_password.clone().or(raw.reddit.password),
                "reddit.password",
            )?,
            timeout_seconds,
            auth_base_url,
            api_base_url,
        };

        let smtp = SmtpConfig {
            server: raw
                .email
                .smtp_server
                .unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
            port: raw.email.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            username: mail_from.clone(),
            password: mail_password,
            timeout_seconds,
        };

        let mut watch = WatchSettings::with_poll_interval(Duration::from_secs(interval as u64));
        if let Some(delay) = raw.bot.reconnect_delay_seconds {
            watch.reconnect_initial = Duration::from_secs(delay);
            watch.reconnect_max = watch.reconnect_max.max(watch.reconnect_initial);
        }

        Ok(Self {
            watch,
            log,
            reddit,
            smtp,
            mail_from,
            mail_to,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(field)),
    }
}

fn base_url(value: Option<String>, default: &str, field: &'static str) -> Result<String, ConfigError> {
    let url = value.unwrap_or_else(|| default.to_string());
    Url::parse(&url).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })?;
    Ok(url)
}
