//! Tamper-evident audit ledger.
//!
//! A [`LedgerChain`] is an append-only sequence of [`LedgerEntry`] values in
//! which every entry carries the hash of its predecessor, starting from a
//! synthetic genesis entry. Verification recomputes every hash, so any edit
//! to a stored entry is detected. Durable storage is injected through
//! [`LedgerStore`]; [`LedgerWriter`] serializes persisted appends through a
//! single owning task.

#![warn(missing_docs, clippy::pedantic)]

mod chain;
mod entry;
mod error;
mod journal;
mod store;
mod writer;

pub use chain::{LedgerAppender, LedgerChain, LedgerSnapshot};
pub use entry::{
    GENESIS_EVENT, IntegrityErrorKind, IntegrityFailure, IntegrityReport, LedgerEntry,
    verify_entries,
};
pub use error::{LedgerError, LedgerResult};
pub use journal::FileLedgerStore;
pub use store::{LedgerStore, MemoryLedgerStore};
pub use writer::{LedgerHandle, LedgerWriter, LedgerWriterConfig};
