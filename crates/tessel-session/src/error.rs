//! Error types for the session engine and its backing store.

/// Error reported by a [`SessionStore`](crate::SessionStore) backend.
///
/// These never cross the engine boundary; the engine hands them to its
/// [`StoreObserver`](crate::StoreObserver) and returns [`Error::Internal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected a command.
    #[error("command error: {0}")]
    Command(String),

    /// A batch was discarded without applying any of its operations.
    #[error("batch aborted: {0}")]
    Aborted(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type for session engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The backing store failed. Details are logged, not returned.
    #[error("internal service error")]
    Internal,

    /// Every allocation attempt drew an id that was already live.
    #[error("generate reached maximum number of retries")]
    RetriesExhausted {
        /// Number of ids tried before giving up.
        attempts: u32,
    },
}

/// Result type for session engine operations.
pub type Result<T> = std::result::Result<T, Error>;
