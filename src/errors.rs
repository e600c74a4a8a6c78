//! Error hierarchy for the flag provider.
//!
//! Recoverable store failures are retried by the caller and surfaced here
//! only after the final attempt; validation failures are raised eagerly at
//! construction and never retried; fatal watcher conditions are announced
//! asynchronously on the event channel rather than through these types.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested flag absent from the store. Terminal: read paths do not
    /// retry this outcome.
    #[error("flag {0} not found")]
    FlagNotFound(String),

    /// The aggregated flag document absent from the store. Terminal.
    #[error("document {0} not found")]
    DocumentNotFound(String),

    /// Options incomplete or inconsistent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Driver or network failure that survived every retry.
    #[error("{operation} failed after {attempts} attempts")]
    Store {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },

    /// Change-stream disconnect or decode failure.
    #[error("change stream: {0}")]
    Stream(String),

    /// `init` called on a provider that is already ready.
    #[error("provider is already initialized")]
    AlreadyInitialized,

    /// Settings file or environment loading failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Construction-time option validation failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing database name")]
    MissingDatabase,

    #[error("missing collection name")]
    MissingCollection,

    #[error("document id must not be empty when provided")]
    EmptyDocumentId,

    #[error("max tries must be at least 1")]
    ZeroMaxTries,
}
