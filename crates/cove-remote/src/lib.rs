pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;

pub use client::RemoteClient;
pub use config::RemoteConfig;
pub use error::{Error, Result};
pub use feed::{FeedHandle, FeedOpener, FeedScope, RealtimeFeed};
pub use gateway::Gateway;
