use async_trait::async_trait;
use interfaces::defs::{Alert, MailSession, Service, SessionError};

/// Mail session that records every alert and fails the sends it is told to.
#[derive(Default)]
pub struct RecordingMailSession {
    pub sent: Vec<Alert>,
    pub attempts: usize,
    pub fail_next: usize,
}

impl RecordingMailSession {
    pub fn failing(times: usize) -> Self {
        Self {
            fail_next: times,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MailSession for RecordingMailSession {
    async fn send(&mut self, alert: &Alert) -> Result<(), SessionError> {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SessionError::connectivity(Service::Mail, "421 service not available"));
        }
        self.sent.push(alert.clone());
        Ok(())
    }
}
