pub mod defs;

pub use defs::{
    Alert, FeedConnector, FeedSession, MailConnector, MailSession, Post, Service, SessionError,
};
