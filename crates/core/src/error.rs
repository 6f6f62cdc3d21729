//! Unified error types for shelfmark.
//!
//! Dataset-level failures (network, parse, validation) are caught at the
//! cache boundary and degrade to the last known good value; they only
//! surface here so callers can log them.

use tokio_rusqlite::rusqlite;

/// Unified error types for the shelfmark crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network fetch failed or timed out.
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),

    /// Payload could not be decoded.
    #[error("PARSE_FAILURE: {0}")]
    Parse(String),

    /// Payload decoded but failed a sanity check.
    #[error("VALIDATION_FAILURE: {0}")]
    Validation(String),

    /// Account snapshot was empty and no cached copy exists.
    #[error("NOT_AUTHENTICATED: no account data available; sign in to the store to fix this")]
    NotAuthenticated,

    /// Invalid input parameters (e.g., empty HTML).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Key-value store operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("only 12 entries".to_string());
        assert!(err.to_string().contains("VALIDATION_FAILURE"));
        assert!(err.to_string().contains("12 entries"));
    }

    #[test]
    fn test_json_error_becomes_parse() {
        let err = serde_json::from_str::<u32>("oops").unwrap_err();
        assert!(matches!(Error::from(err), Error::Parse(_)));
    }
}
