//! Adapters for the remote tabular store that mirrors the ledger.
//!
//! A [RecordStore] exposes three primitives over a fixed rectangular range:
//! read every row, append rows, and clear the range. Clearing is idempotent;
//! appending is not, so callers must not retry it blindly.

pub mod credentials;
mod memory;
mod sheets;

pub use credentials::ServiceAccountKey;
pub use memory::{Memory, Operation};
pub use oro_types::{Cell, Row};
pub use sheets::Sheets;

use std::future::Future;
use thiserror::Error;

/// Environment variable holding the service account key (raw or base64 JSON).
pub const KEY_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_KEY";

/// Environment variable holding the spreadsheet id.
pub const SHEET_ID_ENV: &str = "GOOGLE_SHEET_ID";

/// Maximum rows covered by the store's range (`A1:F1000`).
pub const MAX_ROWS: usize = 1000;

/// Whether a failure needs an operator to fix configuration or may go away
/// on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transient,
}

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("service account credentials not found: set {env} or provide {path}")]
    MissingCredentials { env: &'static str, path: String },
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),
    #[error("missing spreadsheet id: set {0}")]
    MissingDocumentId(&'static str),
    #[error("signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status} {body}")]
    Failed {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredentials { .. }
            | Error::InvalidCredentials(_)
            | Error::MissingDocumentId(_)
            | Error::Signing(_)
            | Error::InvalidEndpoint(_) => ErrorKind::Configuration,
            Error::Failed { status, .. }
                if matches!(
                    *status,
                    reqwest::StatusCode::BAD_REQUEST
                        | reqwest::StatusCode::UNAUTHORIZED
                        | reqwest::StatusCode::FORBIDDEN
                        | reqwest::StatusCode::NOT_FOUND
                ) =>
            {
                ErrorKind::Configuration
            }
            Error::Reqwest(_)
            | Error::Failed { .. }
            | Error::UnexpectedResponse(_)
            | Error::Unavailable(_) => ErrorKind::Transient,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A remote rectangular range of rows.
pub trait RecordStore: Send + Sync {
    /// Every row in the range, top to bottom.
    fn read_all(&self) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Appends `rows` after the last non-empty row.
    fn append_rows(&self, rows: Vec<Row>) -> impl Future<Output = Result<()>> + Send;

    /// Empties the whole range.
    fn clear_range(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::MissingDocumentId(SHEET_ID_ENV).kind(),
            ErrorKind::Configuration
        );
        assert!(Error::MissingCredentials {
            env: KEY_ENV,
            path: "service-account.json".to_string(),
        }
        .is_configuration());
        assert_eq!(
            Error::Failed {
                status: reqwest::StatusCode::FORBIDDEN,
                body: String::new(),
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::Failed {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: String::new(),
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            Error::Unavailable("down".to_string()).kind(),
            ErrorKind::Transient
        );
    }
}
