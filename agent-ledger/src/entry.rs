//! Hash-linked ledger entries.

use std::fmt;

use agent_primitives::{EntryId, ZERO_HASH, canonical_json, sha256_hex};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event type of the synthetic first entry of every chain.
pub const GENESIS_EVENT: &str = "genesis";

/// One immutable, hash-linked audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub(crate) entry_id: EntryId,
    pub(crate) event_type: String,
    pub(crate) data: Map<String, Value>,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) previous_hash: String,
    pub(crate) entry_hash: String,
}

impl LedgerEntry {
    pub(crate) fn new(
        event_type: impl Into<String>,
        data: Map<String, Value>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut entry = Self {
            entry_id: EntryId::random(),
            event_type: event_type.into(),
            data,
            // Microsecond precision keeps the hashed timestamp text stable
            // across serialization round trips.
            timestamp: Utc::now().trunc_subsecs(6),
            previous_hash: previous_hash.into(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    pub(crate) fn genesis() -> Self {
        let mut data = Map::new();
        data.insert("message".into(), Value::from("ledger initialized"));
        Self::new(GENESIS_EVENT, data, ZERO_HASH)
    }

    /// Recomputes the hash from the entry's own fields.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let payload = format!(
            "{}{}{}{}{}",
            self.entry_id,
            self.event_type,
            self.timestamp_string(),
            canonical_json(&Value::Object(self.data.clone())),
            self.previous_hash
        );
        sha256_hex(payload.as_bytes())
    }

    /// Returns true when the stored hash matches the recomputed one.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.entry_hash
    }

    /// Returns true for the synthetic first entry.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.event_type == GENESIS_EVENT && self.previous_hash == ZERO_HASH
    }

    /// Entry identifier.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    /// Event type, e.g. `decision`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Event payload.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// UTC creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 form of the timestamp as it enters the hash.
    #[must_use]
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Hash of the preceding entry.
    #[must_use]
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Hash of this entry.
    #[must_use]
    pub fn entry_hash(&self) -> &str {
        &self.entry_hash
    }
}

/// Which check an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityErrorKind {
    /// Stored hash differs from the hash of the entry's fields.
    HashMismatch,
    /// `previous_hash` does not equal the prior entry's hash, or the chain
    /// does not start with a genesis entry.
    BrokenChain,
}

impl fmt::Display for IntegrityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HashMismatch => "hash_mismatch",
            Self::BrokenChain => "broken_chain",
        })
    }
}

/// Identifies the first entry that failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} at index {index} (entry {entry_id}): {detail}")]
pub struct IntegrityFailure {
    /// Failed check.
    pub kind: IntegrityErrorKind,
    /// Offending entry.
    pub entry_id: EntryId,
    /// Position of the offending entry in the chain.
    pub index: usize,
    /// Human-readable detail.
    pub detail: String,
}

/// Result of walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True when every entry verified.
    pub valid: bool,
    /// Number of entries that verified before the walk stopped.
    pub entries_verified: usize,
    /// Hash of the last entry in the chain.
    pub chain_head_hash: String,
    /// First failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<IntegrityFailure>,
}

/// Verifies hashes and linkage of an ordered slice of entries.
///
/// The first entry must be a genesis entry. The walk stops at the first
/// failure.
#[must_use]
pub fn verify_entries(entries: &[LedgerEntry]) -> IntegrityReport {
    let chain_head_hash = entries
        .last()
        .map(|entry| entry.entry_hash.clone())
        .unwrap_or_default();

    for (index, entry) in entries.iter().enumerate() {
        let failure = if !entry.verify_hash() {
            Some((
                IntegrityErrorKind::HashMismatch,
                format!(
                    "stored hash {} does not match computed hash {}",
                    entry.entry_hash,
                    entry.compute_hash()
                ),
            ))
        } else if index == 0 && !entry.is_genesis() {
            Some((
                IntegrityErrorKind::BrokenChain,
                "chain does not start with a genesis entry".to_owned(),
            ))
        } else if index > 0 && entry.previous_hash != entries[index - 1].entry_hash {
            Some((
                IntegrityErrorKind::BrokenChain,
                format!(
                    "previous hash {} does not match prior entry hash {}",
                    entry.previous_hash,
                    entries[index - 1].entry_hash
                ),
            ))
        } else {
            None
        };

        if let Some((kind, detail)) = failure {
            return IntegrityReport {
                valid: false,
                entries_verified: index,
                chain_head_hash,
                error: Some(IntegrityFailure {
                    kind,
                    entry_id: entry.entry_id,
                    index,
                    detail,
                }),
            };
        }
    }

    IntegrityReport {
        valid: true,
        entries_verified: entries.len(),
        chain_head_hash,
        error: None,
    }
}
