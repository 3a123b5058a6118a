//! In-memory working copy of the hash-linked ledger.

use std::sync::{Mutex, MutexGuard};

use agent_primitives::EntryId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::entry::{IntegrityReport, LedgerEntry, verify_entries};
use crate::store::LedgerStore;
use crate::{LedgerError, LedgerResult};

/// Serializable form of a whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Entries in chain order, genesis first.
    pub entries: Vec<LedgerEntry>,
}

/// Append-only, hash-linked sequence of audit entries.
///
/// `append` reads the tail hash and pushes the new entry under one mutex, so
/// concurrent appends always form a single linear chain.
#[derive(Debug)]
pub struct LedgerChain {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl Default for LedgerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerChain {
    /// Creates a chain holding only a fresh genesis entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(vec![LedgerEntry::genesis()]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LedgerEntry>> {
        self.entries.lock().expect("ledger chain poisoned")
    }

    /// Rebuilds a chain from stored entries, re-verifying every hash and link.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Empty`] for an empty list and
    /// [`LedgerError::Integrity`] if any entry fails verification. No partial
    /// chain is returned.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> LedgerResult<Self> {
        if entries.is_empty() {
            return Err(LedgerError::Empty("a chain needs at least a genesis entry"));
        }
        let report = verify_entries(&entries);
        if let Some(failure) = report.error {
            warn!(kind = %failure.kind, index = failure.index, entry_id = %failure.entry_id, "rejected ledger reconstruction");
            return Err(failure.into());
        }
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    /// Rebuilds a chain from a snapshot. Deserialization doubles as an
    /// integrity check.
    ///
    /// # Errors
    ///
    /// See [`LedgerChain::from_entries`].
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        Self::from_entries(snapshot.entries)
    }

    /// Decodes and verifies a chain from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Serialization`] when fields are missing or
    /// malformed, otherwise see [`LedgerChain::from_entries`].
    pub fn from_value(value: Value) -> LedgerResult<Self> {
        let snapshot: LedgerSnapshot = serde_json::from_value(value)?;
        Self::from_snapshot(snapshot)
    }

    /// Loads every stored entry and verifies it. An empty store yields a new
    /// chain whose genesis entry is persisted immediately.
    ///
    /// # Errors
    ///
    /// Propagates storage errors and integrity failures.
    pub async fn restore(store: &dyn LedgerStore) -> LedgerResult<Self> {
        let entries = store.load_all_entries().await?;
        if entries.is_empty() {
            let chain = Self::new();
            store.save_entry(&chain.genesis()).await?;
            debug!("initialized empty ledger store with genesis entry");
            return Ok(chain);
        }
        let count = entries.len();
        let chain = Self::from_entries(entries)?;
        debug!(entries = count, "ledger restored from storage");
        Ok(chain)
    }

    /// Appends an entry linked to the current tail.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn append(&self, event_type: impl Into<String>, data: Map<String, Value>) -> LedgerEntry {
        let mut entries = self.lock();
        let previous = entries
            .last()
            .map(|entry| entry.entry_hash.clone())
            .unwrap_or_default();
        let entry = LedgerEntry::new(event_type, data, previous);
        debug!(entry_id = %entry.entry_id, event_type = entry.event_type(), hash = entry.entry_hash(), "ledger entry appended");
        entries.push(entry.clone());
        entry
    }

    /// Builds the next entry without adding it. Used by the writer so an
    /// entry is only committed after it has been persisted.
    pub(crate) fn prepare(&self, event_type: impl Into<String>, data: Map<String, Value>) -> LedgerEntry {
        LedgerEntry::new(event_type, data, self.head_hash())
    }

    /// Adds a prepared entry if it still links to the tail.
    pub(crate) fn commit(&self, entry: LedgerEntry) -> LedgerResult<()> {
        let mut entries = self.lock();
        let head = entries
            .last()
            .map(|entry| entry.entry_hash.clone())
            .unwrap_or_default();
        if entry.previous_hash != head {
            return Err(LedgerError::StaleAppend {
                expected: head,
                found: entry.previous_hash,
            });
        }
        debug!(entry_id = %entry.entry_id, event_type = entry.event_type(), hash = entry.entry_hash(), "ledger entry committed");
        entries.push(entry);
        Ok(())
    }

    /// Walks the chain, recomputing every hash and checking every link.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        let report = verify_entries(&self.lock());
        if let Some(failure) = &report.error {
            warn!(kind = %failure.kind, index = failure.index, entry_id = %failure.entry_id, "ledger integrity check failed");
        }
        report
    }

    /// Finds an entry by id.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn get_entry(&self, entry_id: EntryId) -> Option<LedgerEntry> {
        self.lock()
            .iter()
            .find(|entry| entry.entry_id == entry_id)
            .cloned()
    }

    /// Returns all entries with the given event type, in chain order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn get_entries_by_type(&self, event_type: &str) -> Vec<LedgerEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Copy of every entry, genesis first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().clone()
    }

    /// The genesis entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn genesis(&self) -> LedgerEntry {
        self.lock()[0].clone()
    }

    /// Hash of the newest entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn head_hash(&self) -> String {
        self.lock()
            .last()
            .map(|entry| entry.entry_hash.clone())
            .unwrap_or_default()
    }

    /// Number of entries including genesis.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Always false: a chain holds at least its genesis entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the chain for serialization.
    #[must_use]
    pub fn to_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            entries: self.entries(),
        }
    }

    /// JSON form of the chain.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> LedgerResult<Value> {
        Ok(serde_json::to_value(self.to_snapshot())?)
    }
}

/// Anything that can append an event to a ledger and report the new entry.
#[async_trait]
pub trait LedgerAppender: Send + Sync {
    /// Appends an event and returns the committed entry.
    async fn append_event(
        &self,
        event_type: &str,
        data: Map<String, Value>,
    ) -> LedgerResult<LedgerEntry>;
}

#[async_trait]
impl LedgerAppender for LedgerChain {
    async fn append_event(
        &self,
        event_type: &str,
        data: Map<String, Value>,
    ) -> LedgerResult<LedgerEntry> {
        Ok(self.append(event_type, data))
    }
}
