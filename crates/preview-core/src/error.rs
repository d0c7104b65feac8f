use thiserror::Error;

/// Failure of a catalog search.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Connectivity or transport failure; recoverable by retrying later.
    #[error("network unavailable: {0}")]
    Network(String),

    /// Anything the provider returned that we cannot make sense of.
    #[error("unexpected provider failure: {0}")]
    Unexpected(String),

    /// The worker was aborted because a newer search superseded it.
    #[error("search cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The player backend could not be started or reached.
    #[error("playback engine unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or never answered a command.
    #[error("playback command failed: {0}")]
    Command(String),
}

/// Fatal session errors.  Ends `SessionCore::run`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("catalog failed unexpectedly while searching {query:?}: {reason}")]
    UnexpectedProviderFailure { query: String, reason: String },
}
