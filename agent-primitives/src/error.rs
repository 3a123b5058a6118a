//! Shared error definitions for governance primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the governance core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// A UUID-backed identifier could not be parsed.
    #[error("invalid identifier: {source}")]
    InvalidUuid {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Capability token identifier failed validation.
    #[error("invalid token id `{id}`: {reason}")]
    InvalidTokenId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
