use clap::Parser;
use email_alerts::{Notifier, SmtpConnector};
use giveaway_watch::{logging, Config, GiveawayWatcher, Overrides, RedditConnector, WatchError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Watch a subreddit for posts flaired "giveaway" and email an alert for each new one.
#[derive(Debug, Parser)]
#[command(name = "giveaway-watch", version)]
struct Cli {
    /// Path to the TOML settings file.
    #[arg(short, long, env = "GIVEAWAY_WATCH_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `email.password` from the settings file.
    #[arg(long, env = "GIVEAWAY_WATCH_MAIL_PASSWORD", hide_env_values = true)]
    mail_password: Option<String>,

    /// Overrides `reddit.password` from the settings file.
    #[arg(long, env = "GIVEAWAY_WATCH_REDDIT_PASSWORD", hide_env_values = true)]
    reddit_password: Option<String>,

    /// Connect to reddit and the mail relay once, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = Overrides {
        mail_password: cli.mail_password.clone(),
        reddit_password: cli.reddit_password.clone(),
    };

    let config = match Config::load(&cli.config, &overrides) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console();
            let e = WatchError::from(e);
            error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = logging::init(&config.log) {
        logging::init_console();
        error!("{}", e);
        return ExitCode::from(e.exit_code());
    }

    info!("Successfully read in settings from {}", cli.config.display());

    match run(config, cli.check).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(config: Config, check_only: bool) -> Result<(), WatchError> {
    let feed = RedditConnector::new(config.reddit.clone())?;
    let mail = SmtpConnector::new(config.smtp.clone());
    let notifier = Notifier::new(config.mail_from.clone(), config.mail_to.clone(), config.subreddit());

    let watcher = GiveawayWatcher::new(feed, mail, notifier, config.watch.clone());

    if check_only {
        let mut session = watcher.connect().await?;
        session.close().await;
        info!("Both sessions established, settings look good");
        return Ok(());
    }

    info!(
        "Watching /r/{} every {:?}",
        config.subreddit(),
        config.watch.poll_interval
    );

    watcher.run_until(shutdown_signal()).await?;

    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
