//! Error types for the ledger subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

use crate::entry::IntegrityFailure;

/// Errors emitted by ledger components.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An entry failed hash or linkage verification. Fatal for the chain.
    #[error("ledger integrity failure: {0}")]
    Integrity(#[from] IntegrityFailure),
    /// Stored entries did not form a chain at all (e.g. no genesis entry).
    #[error("ledger is empty: {0}")]
    Empty(&'static str),
    /// An entry was prepared against a tail that has since moved.
    #[error("stale append: entry links to {found} but chain head is {expected}")]
    StaleAppend {
        /// Current head hash of the chain.
        expected: String,
        /// Previous hash carried by the rejected entry.
        found: String,
    },
    /// Underlying I/O failure while reading or writing ledger files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// Storage backend reported an application error.
    #[error("ledger storage error: {reason}")]
    Storage {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// The ledger writer task has stopped.
    #[error("ledger writer closed")]
    WriterClosed,
}

impl LedgerError {
    /// Helper to construct storage errors from string-like values.
    #[must_use]
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
