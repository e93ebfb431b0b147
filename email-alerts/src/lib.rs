pub mod notifier;
pub mod smtp;

pub use notifier::Notifier;
pub use smtp::{validate_address, SmtpConfig, SmtpConnector, SmtpSession, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};
