use crate::types::{LogTarget, Result, WatchError};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console lines are bare messages; file lines carry a timestamp.
pub fn init(target: &LogTarget) -> Result<()> {
    let console = fmt::layer().without_time().with_target(false);

    let file = match target {
        LogTarget::Console => None,
        LogTarget::ConsoleAndFile(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| WatchError::Logging(e.to_string()))
}

/// Console-only logging for errors raised before the config is known.
pub fn init_console() {
    let _ = tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_env_filter(env_filter())
        .try_init();
}
