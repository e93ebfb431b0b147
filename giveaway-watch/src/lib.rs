pub mod config;
pub mod fetcher;
pub mod logging;
pub mod parser;
pub mod state;
pub mod types;
pub mod watcher;

pub use config::{Config, Overrides};
pub use fetcher::{RedditConnector, RedditSession};
pub use state::SeenLedger;
pub use types::*;
pub use watcher::{qualifies, ActiveSession, GiveawayWatcher};
