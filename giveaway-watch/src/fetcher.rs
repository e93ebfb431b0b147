use crate::parser::parse_listing;
use crate::types::{Post, RedditConfig, Result, Service, SessionError};
use async_trait::async_trait;
use interfaces::defs::{FeedConnector, FeedSession};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Renew this long before reddit says the token lapses.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

struct AccessToken {
    value: String,
    renew_at: Option<Instant>,
}

impl AccessToken {
    fn is_stale(&self) -> bool {
        self.renew_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Password-grant login shared by the connector and every session it makes.
struct Authenticator {
    client: Client,
    config: RedditConfig,
    token_url: Url,
    revoke_url: Url,
}

impl Authenticator {
    async fn request_token(&self) -> std::result::Result<AccessToken, SessionError> {
        debug!("Requesting access token from {}", self.token_url);

        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SessionError::rejected(
                Service::Feed,
                format!("token endpoint returned HTTP {} for client id {}", status, self.config.client_id),
            ));
        }
        if !status.is_success() {
            return Err(SessionError::connectivity(
                Service::Feed,
                format!("token endpoint returned HTTP {}", status),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        match token {
            TokenResponse { access_token: Some(value), expires_in, .. } if !value.is_empty() => {
                let renew_at = expires_in.map(|secs| {
                    Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN)
                });
                Ok(AccessToken { value, renew_at })
            }
            TokenResponse { error: Some(error), .. } if is_credential_error(&error) => Err(
                SessionError::rejected(Service::Feed, format!("{} for user {}", error, self.config.username)),
            ),
            TokenResponse { error, .. } => Err(SessionError::connectivity(
                Service::Feed,
                format!("no access token in reply ({})", error.unwrap_or_else(|| "no error given".to_string())),
            )),
        }
    }

    async fn revoke(&self, token: &str) {
        let result = self
            .client
            .post(self.revoke_url.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await;

        match result {
            Ok(response) => debug!("Revoked reddit token (HTTP {})", response.status()),
            Err(e) => debug!("Failed to revoke reddit token: {}", e),
        }
    }
}

/// Authenticates against reddit with the script-app password grant.
pub struct RedditConnector {
    auth: Arc<Authenticator>,
    listing_url: Url,
}

impl RedditConnector {
    pub fn new(config: RedditConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let auth_base = Url::parse(&config.auth_base_url)?;
        let api_base = Url::parse(&config.api_base_url)?;
        let token_url = auth_base.join("api/v1/access_token")?;
        let revoke_url = auth_base.join("api/v1/revoke_token")?;
        let listing_url = api_base.join(&format!("r/{}/new", config.subreddit))?;

        Ok(Self {
            auth: Arc::new(Authenticator {
                client,
                config,
                token_url,
                revoke_url,
            }),
            listing_url,
        })
    }
}

#[async_trait]
impl FeedConnector for RedditConnector {
    type Session = RedditSession;

    async fn connect(&self) -> std::result::Result<RedditSession, SessionError> {
        let token = self.auth.request_token().await?;

        info!("Successfully connected to reddit as {}", self.auth.config.username);

        Ok(RedditSession {
            auth: Arc::clone(&self.auth),
            token: Some(token),
            listing_url: self.listing_url.clone(),
        })
    }
}

/// Outcome of one listing request.
enum Listing {
    Posts(Vec<Post>),
    Unauthorized,
}

pub struct RedditSession {
    auth: Arc<Authenticator>,
    token: Option<AccessToken>,
    listing_url: Url,
}

impl RedditSession {
    /// Swap in a fresh token without dropping the session. A rejected
    /// login here is as fatal as one at connect time.
    async fn renew_token(&mut self) -> std::result::Result<(), SessionError> {
        info!("Renewing reddit access token");
        let token = self.auth.request_token().await?;
        self.token = Some(token);
        Ok(())
    }

    async fn request_listing(&self, token: &str, limit: usize) -> std::result::Result<Listing, SessionError> {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("raw_json", "1");

        let response = self
            .auth
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Listing::Unauthorized);
        }
        if !status.is_success() {
            return Err(SessionError::connectivity(
                Service::Feed,
                format!("listing returned HTTP {}", status),
            ));
        }

        let body = response.text().await.map_err(transport_error)?;
        let posts = parse_listing(&body).map_err(|e| {
            SessionError::connectivity(Service::Feed, format!("malformed listing: {}", e))
        })?;

        Ok(Listing::Posts(posts))
    }

    fn current_token(&self) -> std::result::Result<String, SessionError> {
        self.token
            .as_ref()
            .map(|token| token.value.clone())
            .ok_or_else(|| SessionError::connectivity(Service::Feed, "session already closed"))
    }
}

#[async_trait]
impl FeedSession for RedditSession {
    async fn fetch_recent(&mut self, limit: usize) -> std::result::Result<Vec<Post>, SessionError> {
        let stale = match &self.token {
            Some(token) => token.is_stale(),
            None => return Err(SessionError::connectivity(Service::Feed, "session already closed")),
        };
        if stale {
            self.renew_token().await?;
        }

        let token = self.current_token()?;
        let first = self.request_listing(&token, limit).await?;

        let posts = match first {
            Listing::Posts(posts) => posts,
            Listing::Unauthorized => {
                debug!("Listing answered 401, token expired early");
                self.renew_token().await?;
                let token = self.current_token()?;
                let retry = self.request_listing(&token, limit).await?;
                match retry {
                    Listing::Posts(posts) => posts,
                    Listing::Unauthorized => {
                        return Err(SessionError::connectivity(
                            Service::Feed,
                            "listing still unauthorized with a fresh token",
                        ))
                    }
                }
            }
        };

        debug!("Fetched {} posts from {}", posts.len(), self.listing_url);
        Ok(posts)
    }

    async fn close(&mut self) {
        if let Some(token) = self.token.take() {
            self.auth.revoke(&token.value).await;
        }
    }
}

fn is_credential_error(error: &str) -> bool {
    matches!(error, "invalid_grant" | "invalid_client" | "unauthorized_client")
}

fn transport_error(err: reqwest::Error) -> SessionError {
    let reason = if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    };
    SessionError::connectivity(Service::Feed, reason)
}
