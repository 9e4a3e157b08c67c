//! Error types for the Betakit engine.

use thiserror::Error;

/// Errors that can occur across the Betakit engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Adapter already connected")]
    AlreadyConnected,

    #[error("Adapter not connected")]
    NotConnected,

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Unknown adapter category: {0}")]
    UnknownCategory(String),

    #[error("Adapter category already registered: {0}")]
    DuplicateCategory(String),

    #[error("Metrics store busy, retry the write")]
    StoreBusy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the caller may retry the failed operation as-is.
    ///
    /// Only metrics-store contention is transient; every other variant needs
    /// caller intervention (fixed config, fresh instance, different category).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreBusy)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_busy_is_transient() {
        assert!(Error::StoreBusy.is_transient());
        assert!(!Error::NotConnected.is_transient());
        assert!(!Error::Configuration("missing browser".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::UnknownCategory("daw".into());
        assert_eq!(err.to_string(), "Unknown adapter category: daw");

        let err = Error::SessionLost("driver exited".into());
        assert_eq!(err.to_string(), "Session lost: driver exited");
    }
}
