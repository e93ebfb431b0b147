#![allow(dead_code)]

use async_trait::async_trait;
use giveaway_watch::{Alert, Post, Service, SessionError};
use interfaces::defs::{FeedConnector, FeedSession, MailConnector, MailSession};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, Once};
use tokio::sync::Notify;
use tokio::time::Instant;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn post(id: &str, tag: Option<&str>) -> Post {
    Post {
        id: id.to_string(),
        title: format!("post {}", id),
        url: format!("https://redd.it/{}", id),
        tag: tag.map(str::to_string),
    }
}

/// The batch from the documented scenario: a1 and a3 qualify, a2 has no tag.
pub fn scenario_batch() -> Vec<Post> {
    vec![
        post("a1", Some("Giveaway")),
        post("a2", None),
        post("a3", Some("giveaway")),
    ]
}

pub fn lost(service: Service) -> SessionError {
    SessionError::connectivity(service, "connection reset by peer")
}

pub fn rejected(service: Service) -> SessionError {
    SessionError::rejected(service, "bad credentials")
}

#[derive(Default)]
pub struct FeedScript {
    /// Outcome of each connect call; an empty queue means success.
    pub connects: VecDeque<Result<(), SessionError>>,
    /// Outcome of each fetch; once empty, `done` is signalled and fetches return nothing.
    pub fetches: VecDeque<Result<Vec<Post>, SessionError>>,
    pub connect_calls: usize,
    pub fetch_times: Vec<Instant>,
    pub closes: usize,
}

#[derive(Clone, Default)]
pub struct FakeFeed {
    pub script: Arc<Mutex<FeedScript>>,
    pub done: Arc<Notify>,
}

impl FakeFeed {
    pub fn with_fetches(fetches: Vec<Result<Vec<Post>, SessionError>>) -> Self {
        let feed = Self::default();
        feed.script.lock().unwrap().fetches = fetches.into();
        feed
    }

    pub fn fail_connects(&self, outcomes: Vec<Result<(), SessionError>>) {
        self.script.lock().unwrap().connects = outcomes.into();
    }

    pub fn connect_calls(&self) -> usize {
        self.script.lock().unwrap().connect_calls
    }

    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.script.lock().unwrap().fetch_times.clone()
    }

    pub async fn finished(self) {
        self.done.notified().await
    }
}

pub struct FakeFeedSession {
    feed: FakeFeed,
}

#[async_trait]
impl FeedConnector for FakeFeed {
    type Session = FakeFeedSession;

    async fn connect(&self) -> Result<FakeFeedSession, SessionError> {
        let mut script = self.script.lock().unwrap();
        script.connect_calls += 1;
        match script.connects.pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(FakeFeedSession { feed: self.clone() }),
        }
    }
}

#[async_trait]
impl FeedSession for FakeFeedSession {
    async fn fetch_recent(&mut self, limit: usize) -> Result<Vec<Post>, SessionError> {
        assert_eq!(limit, 30);
        let mut script = self.feed.script.lock().unwrap();
        script.fetch_times.push(Instant::now());
        match script.fetches.pop_front() {
            Some(outcome) => outcome,
            None => {
                self.feed.done.notify_one();
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) {
        self.feed.script.lock().unwrap().closes += 1;
    }
}

#[derive(Default)]
pub struct MailLog {
    pub connects: VecDeque<Result<(), SessionError>>,
    pub connect_calls: usize,
    pub failing_urls: HashSet<String>,
    /// Every send answers like a relay that no longer accepts our password.
    pub reject_sends: bool,
    pub attempts: Vec<String>,
    pub delivered: Vec<Alert>,
    pub closes: usize,
}

#[derive(Clone, Default)]
pub struct FakeMail {
    pub log: Arc<Mutex<MailLog>>,
}

impl FakeMail {
    pub fn failing_for(url: &str) -> Self {
        let mail = Self::default();
        mail.log.lock().unwrap().failing_urls.insert(url.to_string());
        mail
    }

    pub fn rejecting_sends() -> Self {
        let mail = Self::default();
        mail.log.lock().unwrap().reject_sends = true;
        mail
    }

    pub fn fail_connects(&self, outcomes: Vec<Result<(), SessionError>>) {
        self.log.lock().unwrap().connects = outcomes.into();
    }

    /// Bodies end in the post URL followed by "!".
    pub fn delivered_urls(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .delivered
            .iter()
            .map(|alert| {
                alert
                    .body
                    .trim_start_matches("Giveaway happening at ")
                    .trim_end_matches('!')
                    .to_string()
            })
            .collect()
    }

    pub fn attempts(&self) -> Vec<String> {
        self.log.lock().unwrap().attempts.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.log.lock().unwrap().connect_calls
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

pub struct FakeMailSession {
    mail: FakeMail,
}

#[async_trait]
impl MailConnector for FakeMail {
    type Session = FakeMailSession;

    async fn connect(&self) -> Result<FakeMailSession, SessionError> {
        let mut log = self.log.lock().unwrap();
        log.connect_calls += 1;
        match log.connects.pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(FakeMailSession { mail: self.clone() }),
        }
    }
}

#[async_trait]
impl MailSession for FakeMailSession {
    async fn send(&mut self, alert: &Alert) -> Result<(), SessionError> {
        let mut log = self.mail.log.lock().unwrap();
        let url = alert
            .body
            .trim_start_matches("Giveaway happening at ")
            .trim_end_matches('!')
            .to_string();
        log.attempts.push(url.clone());
        if log.reject_sends {
            return Err(SessionError::rejected(Service::Mail, "535 5.7.8 Username and Password not accepted"));
        }
        if log.failing_urls.contains(&url) {
            return Err(SessionError::connectivity(Service::Mail, "451 temporary failure"));
        }
        log.delivered.push(alert.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.mail.log.lock().unwrap().closes += 1;
    }
}

/// Collects formatted log output so tests can count what was emitted.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
