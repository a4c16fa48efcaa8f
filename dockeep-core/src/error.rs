//! Error types and result types for record store operations.
//!
//! Every fallible operation in this crate returns [`RecordStoreResult<T>`]. Errors are
//! handed straight back to the caller; nothing here retries or suppresses a failure.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when persisting or fetching records.
#[derive(Error, Debug)]
pub enum RecordStoreError {
    /// The concrete session type requested from a connection context does not match
    /// the session it wraps.
    #[error("Unknown context type {0}")]
    TypeMismatch(String),
    /// The underlying session could not be reached (connect or ping failed).
    #[error("Session unavailable: {0}")]
    Unavailable(String),
    /// The input handed to a conversion or fetch has the wrong shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The fetch mode is neither `find` nor `aggregate`.
    #[error("Unsupported fetch mode {0}, only accept fetch type aggregate or find")]
    UnsupportedFetchMode(String),
    /// No document matched a fetch. The argument is the collection name.
    #[error("Data not found in collection {0}")]
    NotFound(String),
    /// Serialization/deserialization error when converting between records and documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during session construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error reported by the underlying database, passed through verbatim.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for record store operations.
pub type RecordStoreResult<T> = Result<T, RecordStoreError>;

impl From<BsonError> for RecordStoreError {
    fn from(err: BsonError) -> Self {
        RecordStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for RecordStoreError {
    fn from(err: SerdeJsonError) -> Self {
        RecordStoreError::Serialization(err.to_string())
    }
}
