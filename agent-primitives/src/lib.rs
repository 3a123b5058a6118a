//! Core shared types for the MXP governance core.

#![warn(missing_docs, clippy::pedantic)]

mod digest;
mod error;
mod ids;

/// Canonical JSON encoding and SHA-256 helpers used for every content hash.
pub use digest::{ZERO_HASH, canonical_json, sha256_hex};
/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Identifiers for decisions, ledger entries, and capability tokens.
pub use ids::{EntryId, RequestId, TOKEN_ID_PREFIX, TokenId};
