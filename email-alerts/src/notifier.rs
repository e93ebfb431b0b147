use interfaces::defs::{Alert, MailSession, SessionError};
use tracing::{info, warn};

/// Formats and sends one giveaway alert per post URL.
#[derive(Clone, Debug)]
pub struct Notifier {
    from: String,
    to: String,
    subject: String,
}

impl Notifier {
    /// `feed_name` is the subreddit being watched, without the `/r/` prefix.
    pub fn new(from: impl Into<String>, to: impl Into<String>, feed_name: &str) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: format!("/r/{} giveaway alert!", feed_name),
        }
    }

    pub fn compose(&self, url: &str) -> Alert {
        Alert {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            body: format!("Giveaway happening at {}!", url),
        }
    }

    /// One attempt, no retry. Failures are logged and handed back for the
    /// caller to count; they never end the session.
    pub async fn notify<S>(&self, session: &mut S, url: &str) -> Result<(), SessionError>
    where
        S: MailSession + ?Sized,
    {
        let alert = self.compose(url);

        match session.send(&alert).await {
            Ok(()) => {
                info!("Sent giveaway alert for {} to {}", url, self.to);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send giveaway alert for {}: {}", url, e);
                Err(e)
            }
        }
    }
}
