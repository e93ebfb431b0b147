use async_trait::async_trait;
use interfaces::defs::{Alert, MailConnector, MailSession, Service, SessionError};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Check that `address` is something the relay will accept as a mailbox.
pub fn validate_address(address: &str) -> Result<(), String> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| format!("invalid email address '{}': {}", address, e))
}

/// Builds authenticated STARTTLS sessions against one relay.
pub struct SmtpConnector {
    config: SmtpConfig,
}

impl SmtpConnector {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SessionError> {
        let credentials = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .map_err(|e| SessionError::connectivity(Service::Mail, e.to_string()))?
            .port(self.config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(self.config.timeout_seconds)))
            .build();

        Ok(transport)
    }
}

#[async_trait]
impl MailConnector for SmtpConnector {
    type Session = SmtpSession;

    async fn connect(&self) -> Result<SmtpSession, SessionError> {
        debug!("Connecting to SMTP relay {}:{}", self.config.server, self.config.port);

        let transport = self.build_transport()?;

        // Opens a connection, runs EHLO + STARTTLS + AUTH, then QUITs.
        match transport.test_connection().await {
            Ok(true) => {
                info!("Successfully connected to SMTP server {}:{}", self.config.server, self.config.port);
                Ok(SmtpSession { transport })
            }
            Ok(false) => Err(SessionError::connectivity(
                Service::Mail,
                format!("{} did not answer after login", self.config.server),
            )),
            Err(e) => Err(classify(e)),
        }
    }
}

pub struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn send(&mut self, alert: &Alert) -> Result<(), SessionError> {
        let message = build_message(alert)?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn close(&mut self) {
        // No pooled connection is held between sends.
        debug!("Closing SMTP session");
    }
}

fn build_message(alert: &Alert) -> Result<Message, SessionError> {
    let invalid = |e: String| SessionError::connectivity(Service::Mail, e);

    let from: Mailbox = alert
        .from
        .parse()
        .map_err(|e| invalid(format!("invalid from address: {}", e)))?;
    let to: Mailbox = alert
        .to
        .parse()
        .map_err(|e| invalid(format!("invalid to address: {}", e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(alert.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(alert.body.clone())
        .map_err(|e| invalid(format!("failed to build message: {}", e)))
}

/// 530/534/535 are the relay refusing our login.
fn classify(err: lettre::transport::smtp::Error) -> SessionError {
    let auth_refused = err.is_permanent()
        && err
            .status()
            .is_some_and(|code| code.to_string().starts_with("53"));

    if auth_refused {
        SessionError::rejected(Service::Mail, err.to_string())
    } else {
        SessionError::connectivity(Service::Mail, err.to_string())
    }
}
