pub mod client;
pub mod session;
pub mod storage;
pub mod syncer;

pub use client::Client;
pub use session::Session;
pub use storage::LocalStorage;
pub use syncer::Syncer;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status}{}", .message.as_deref().map(|m| format!(" {m}")).unwrap_or_default())]
    Failed {
        status: reqwest::StatusCode,
        message: Option<String>,
    },
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("local storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Ledger(#[from] oro_execution::LedgerError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
