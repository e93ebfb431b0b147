use std::fmt;

use async_trait::async_trait;

/// One item fetched from the feed source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Category label attached to the post, e.g. a subreddit link flair.
    pub tag: Option<String>,
}

/// A fully addressed plain-text message ready for the mail relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Which upstream a session talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Feed,
    Mail,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Feed => f.write_str("feed source"),
            Service::Mail => f.write_str("mail relay"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The upstream refused our credentials. Retrying cannot help.
    #[error("{service} rejected credentials: {reason}")]
    CredentialsRejected { service: Service, reason: String },

    /// Timeouts, handshake failures, dropped connections, unexpected replies.
    #[error("{service} connection failed: {reason}")]
    Connectivity { service: Service, reason: String },
}

impl SessionError {
    pub fn rejected(service: Service, reason: impl Into<String>) -> Self {
        SessionError::CredentialsRejected { service, reason: reason.into() }
    }

    pub fn connectivity(service: Service, reason: impl Into<String>) -> Self {
        SessionError::Connectivity { service, reason: reason.into() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::CredentialsRejected { .. })
    }

    pub fn service(&self) -> Service {
        match self {
            SessionError::CredentialsRejected { service, .. } => *service,
            SessionError::Connectivity { service, .. } => *service,
        }
    }
}

// Object style note:
// A connector holds the settings needed to authenticate and is reused for
// every reconnect. A session is what one successful authentication yields;
// it is owned by exactly one poll loop and is thrown away whole on failure,
// never patched up in place.

#[async_trait]
pub trait FeedSession: Send {
    /// Fetch up to `limit` of the most recent posts.
    async fn fetch_recent(&mut self, limit: usize) -> Result<Vec<Post>, SessionError>;

    async fn close(&mut self) {}
}

#[async_trait]
pub trait FeedConnector: Send + Sync {
    type Session: FeedSession;

    async fn connect(&self) -> Result<Self::Session, SessionError>;
}

#[async_trait]
pub trait MailSession: Send {
    async fn send(&mut self, alert: &Alert) -> Result<(), SessionError>;

    async fn close(&mut self) {}
}

#[async_trait]
pub trait MailConnector: Send + Sync {
    type Session: MailSession;

    async fn connect(&self) -> Result<Self::Session, SessionError>;
}
