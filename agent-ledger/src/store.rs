//! Storage collaborator contract for durable ledger entries.

use agent_primitives::EntryId;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::LedgerResult;
use crate::entry::LedgerEntry;

/// Durable sink for ledger entries, kept in insertion order.
///
/// Storage is the source of truth across restarts; a [`LedgerChain`] is the
/// working copy and re-verifies everything it loads.
///
/// [`LedgerChain`]: crate::LedgerChain
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists one entry after all previously saved entries.
    async fn save_entry(&self, entry: &LedgerEntry) -> LedgerResult<()>;

    /// Returns every stored entry in insertion order.
    async fn load_all_entries(&self) -> LedgerResult<Vec<LedgerEntry>>;

    /// Looks up a stored entry by id.
    async fn get_entry(&self, entry_id: EntryId) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self
            .load_all_entries()
            .await?
            .into_iter()
            .find(|entry| entry.entry_id() == entry_id))
    }

    /// Returns stored entries with the given event type.
    async fn entries_by_type(&self, event_type: &str) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .load_all_entries()
            .await?
            .into_iter()
            .filter(|entry| entry.event_type() == event_type)
            .collect())
    }
}

/// Volatile store useful for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn save_entry(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn load_all_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn get_entry(&self, entry_id: EntryId) -> LedgerResult<Option<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|entry| entry.entry_id() == entry_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn memory_store_queries() {
        let store = MemoryLedgerStore::new();
        assert!(store.is_empty().await);

        let genesis = LedgerEntry::genesis();
        let decision = LedgerEntry::new("decision", Map::new(), genesis.entry_hash());
        store.save_entry(&genesis).await.unwrap();
        store.save_entry(&decision).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.get_entry(decision.entry_id()).await.unwrap(),
            Some(decision.clone())
        );
        assert_eq!(store.entries_by_type("decision").await.unwrap(), vec![decision]);
    }
}
