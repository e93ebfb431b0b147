use crate::state::SeenLedger;
use crate::types::{CycleReport, Post, SessionError, WatchSettings};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use email_alerts::Notifier;
use interfaces::defs::{FeedConnector, FeedSession, MailConnector, MailSession};
use std::future::Future;
use tracing::{debug, info, warn};

pub const GIVEAWAY_TAG: &str = "giveaway";

/// A post qualifies when its tag is exactly "giveaway", ignoring case.
/// Titles are not looked at.
pub fn qualifies(post: &Post) -> bool {
    post.tag
        .as_deref()
        .is_some_and(|tag| tag.to_lowercase() == GIVEAWAY_TAG)
}

/// Everything owned by one connected run: both sessions and the ledger.
pub struct ActiveSession<F, M> {
    pub feed: F,
    pub mail: M,
    pub ledger: SeenLedger,
}

impl<F: FeedSession, M: MailSession> ActiveSession<F, M> {
    pub async fn close(&mut self) {
        self.feed.close().await;
        self.mail.close().await;
    }
}

pub type SessionsOf<FC, MC> =
    ActiveSession<<FC as FeedConnector>::Session, <MC as MailConnector>::Session>;

enum WatchState<F, M> {
    Reconnecting { attempt: u32 },
    Running(ActiveSession<F, M>),
}

pub struct GiveawayWatcher<FC, MC> {
    feed: FC,
    mail: MC,
    notifier: Notifier,
    settings: WatchSettings,
}

impl<FC, MC> GiveawayWatcher<FC, MC>
where
    FC: FeedConnector,
    MC: MailConnector,
{
    pub fn new(feed: FC, mail: MC, notifier: Notifier, settings: WatchSettings) -> Self {
        Self {
            feed,
            mail,
            notifier,
            settings,
        }
    }

    /// Authenticate both upstreams and start an empty ledger.
    /// A half-built pair is closed before the error is returned.
    pub async fn connect(&self) -> Result<SessionsOf<FC, MC>, SessionError> {
        let mut mail = self.mail.connect().await?;
        info!("Mail session established");

        let feed = match self.feed.connect().await {
            Ok(feed) => feed,
            Err(e) => {
                mail.close().await;
                return Err(e);
            }
        };
        info!("Feed session established");

        Ok(ActiveSession {
            feed,
            mail,
            ledger: SeenLedger::new(),
        })
    }

    /// One fetch-filter-notify pass. A failed fetch or a relay that rejects
    /// our login is an error here; other failed sends are counted in the report.
    pub async fn run_cycle(
        &self,
        session: &mut SessionsOf<FC, MC>,
    ) -> Result<CycleReport, SessionError> {
        let posts = session.feed.fetch_recent(self.settings.batch_size).await?;

        let mut report = CycleReport {
            fetched: posts.len(),
            ..CycleReport::default()
        };

        for post in posts {
            if session.ledger.has_seen(&post.id) {
                continue;
            }
            report.unseen += 1;

            debug!("Checking post \"{}\"...", post.title);

            if qualifies(&post) {
                report.qualified += 1;
                info!("Giveaway detected! {}", post.url);

                match self.notifier.notify(&mut session.mail, &post.url).await {
                    Ok(()) => report.notified += 1,
                    Err(e) if e.is_fatal() => {
                        session.ledger.mark_seen(post.id);
                        return Err(e);
                    }
                    Err(_) => report.failed += 1,
                }
            }

            session.ledger.mark_seen(post.id);
        }

        Ok(report)
    }

    async fn run_session(&self, session: &mut SessionsOf<FC, MC>) -> SessionError {
        loop {
            match self.run_cycle(session).await {
                Ok(report) => debug!(
                    "Cycle done: {} fetched, {} new, {} giveaways, {} alerts sent, {} failed",
                    report.fetched, report.unseen, report.qualified, report.notified, report.failed
                ),
                Err(e) => return e,
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    fn reconnect_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.settings.reconnect_initial,
            initial_interval: self.settings.reconnect_initial,
            max_interval: self.settings.reconnect_max,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Run until `shutdown` resolves or a credential is rejected. A rejection
    /// is returned unlogged; the caller reports it once.
    ///
    /// Any other failure drops both sessions and the ledger, then rebuilds
    /// them from scratch, forever. Open sessions are closed on shutdown.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<(), SessionError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut backoff = self.reconnect_backoff();
        let mut state = WatchState::Reconnecting { attempt: 0 };

        loop {
            state = match state {
                WatchState::Reconnecting { attempt } => {
                    if attempt > 0 {
                        let delay = backoff.next_backoff().unwrap_or(self.settings.reconnect_max);
                        info!("Reconnect attempt {} in {:?}", attempt, delay);

                        let interrupted = tokio::select! {
                            _ = tokio::time::sleep(delay) => false,
                            _ = &mut shutdown => true,
                        };
                        if interrupted {
                            info!("Shutdown requested while reconnecting");
                            return Ok(());
                        }
                    }

                    let connected = tokio::select! {
                        result = self.connect() => Some(result),
                        _ = &mut shutdown => None,
                    };

                    match connected {
                        None => {
                            info!("Shutdown requested while connecting");
                            return Ok(());
                        }
                        Some(Ok(session)) => {
                            backoff.reset();
                            WatchState::Running(session)
                        }
                        Some(Err(e)) if e.is_fatal() => return Err(e),
                        Some(Err(e)) => {
                            warn!("Failed to establish sessions: {}", e);
                            WatchState::Reconnecting { attempt: attempt + 1 }
                        }
                    }
                }
                WatchState::Running(mut session) => {
                    let outcome = tokio::select! {
                        e = self.run_session(&mut session) => Some(e),
                        _ = &mut shutdown => None,
                    };

                    session.close().await;

                    match outcome {
                        None => {
                            info!("Shutdown requested, sessions closed");
                            return Ok(());
                        }
                        Some(e) if e.is_fatal() => return Err(e),
                        Some(e) => {
                            warn!("Lost connection ({}), rebuilding sessions", e);
                            WatchState::Reconnecting { attempt: 1 }
                        }
                    }
                }
            };
        }
    }
}
