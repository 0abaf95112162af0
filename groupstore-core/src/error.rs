//! Error types for groupstore-core

use crate::types::EntityId;
use thiserror::Error;

/// Main error type for the groupstore-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (directory or database file could not be created/opened)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity body could not be serialized or deserialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(String),

    /// An entity with this identity is already stored
    #[error("entity already exists: {0}")]
    Conflict(EntityId),

    /// No entity with this identity is stored
    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// The entity carries no identity, so there is nothing to look up
    #[error("entity has no identity")]
    MissingId,

    /// The identity high-water mark is at `i64::MAX`; no fresh id can be assigned
    #[error("no identities left to assign")]
    IdsExhausted,

    /// A thread panicked while holding the connection
    #[error("store connection lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// True for errors that mean "the referenced entity does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::MissingId)
    }

    /// True for duplicate-identity errors.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// Result type alias for groupstore-core
pub type Result<T> = std::result::Result<T, Error>;
