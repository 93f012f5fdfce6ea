use uuid::Uuid;

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the episodic memory service.
///
/// Each variant maps to a propagation decision documented on its own line:
/// the API layer surfaces `Validation`, `FactNotFound`, `NotImplemented` and
/// `StorageUnavailable` directly; everything else becomes an opaque `500`
/// after being logged with context. Workers never propagate an `Error` to a
/// caller — they fold every variant into a job state transition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or out-of-range input. Never retried internally.
    #[error("validation error: {0}")]
    Validation(String),

    /// The database connection could not be established or a query failed
    /// for a reason unrelated to a conflicting transaction.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A transactional write rolled back due to a serialization conflict.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    /// The text encoder failed or returned a malformed vector.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Cache I/O failed. Never surfaced to a caller — logged and swallowed
    /// at the call site; kept as a variant so the failure is still typed.
    #[error("cache error: {0}")]
    Cache(String),

    /// A fact lookup matched no episode.
    #[error("no fact of type {0:?} found")]
    FactNotFound(String),

    /// The requested operation is deliberately unimplemented (real pruning
    /// deletion is a safety no-op in this version).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The embedding encoder is reachable in principle but unavailable right
    /// now (e.g. a remote model service is down).
    #[error("encoder temporarily unavailable: {0}")]
    TransientDependencyFailure(String),

    /// An episode or job id did not resolve to a row.
    #[error("not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is worth retrying with backoff.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(_)
                | Error::StorageConflict(_)
                | Error::Encoder(_)
                | Error::TransientDependencyFailure(_)
                | Error::Io(_)
        )
    }
}
