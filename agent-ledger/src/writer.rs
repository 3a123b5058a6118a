//! Single-writer ledger task with a bounded append queue.
//!
//! All persisted appends for a chain go through one owning task. Each append
//! is prepared against the current head, saved to the store, and only then
//! committed to the in-memory chain, so a storage failure never leaves the
//! working copy ahead of durable state. The bounded queue applies
//! backpressure when the store is slower than decision throughput.

use std::num::NonZeroUsize;
use std::sync::Arc;

use agent_primitives::EntryId;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chain::{LedgerAppender, LedgerChain};
use crate::entry::{IntegrityReport, LedgerEntry};
use crate::store::LedgerStore;
use crate::{LedgerError, LedgerResult};

/// Configuration for the ledger writer.
#[derive(Debug, Clone, Copy)]
pub struct LedgerWriterConfig {
    queue_capacity: NonZeroUsize,
}

impl LedgerWriterConfig {
    /// Creates a configuration with the provided queue capacity.
    #[must_use]
    pub const fn new(queue_capacity: NonZeroUsize) -> Self {
        Self { queue_capacity }
    }

    /// Returns the configured queue capacity.
    #[must_use]
    pub const fn queue_capacity(self) -> NonZeroUsize {
        self.queue_capacity
    }
}

impl Default for LedgerWriterConfig {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(1024).expect("non-zero"))
    }
}

struct AppendCommand {
    event_type: String,
    data: Map<String, Value>,
    reply: oneshot::Sender<LedgerResult<LedgerEntry>>,
}

/// Spawns and owns the writer task.
pub struct LedgerWriter;

impl LedgerWriter {
    /// Restores a chain from `store` and starts a writer for it.
    ///
    /// # Errors
    ///
    /// Propagates storage errors and integrity failures from
    /// [`LedgerChain::restore`].
    pub async fn open(
        store: Arc<dyn LedgerStore>,
        config: LedgerWriterConfig,
    ) -> LedgerResult<(LedgerHandle, JoinHandle<()>)> {
        let chain = Arc::new(LedgerChain::restore(store.as_ref()).await?);
        Ok(Self::spawn(chain, store, config))
    }

    /// Starts a writer for an existing chain. The chain must already mirror
    /// the store's contents; the writer refuses any append once the chain's
    /// head no longer matches the last entry it persisted.
    #[must_use]
    pub fn spawn(
        chain: Arc<LedgerChain>,
        store: Arc<dyn LedgerStore>,
        config: LedgerWriterConfig,
    ) -> (LedgerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity().get());
        let task = tokio::spawn(run(Arc::clone(&chain), store, receiver));
        (LedgerHandle { sender, chain }, task)
    }
}

async fn run(
    chain: Arc<LedgerChain>,
    store: Arc<dyn LedgerStore>,
    mut receiver: mpsc::Receiver<AppendCommand>,
) {
    // Hash of the newest entry known to be in the store.
    let mut durable_head = chain.head_hash();
    while let Some(command) = receiver.recv().await {
        let entry = chain.prepare(command.event_type, command.data);
        let result = if entry.previous_hash() == durable_head {
            match store.save_entry(&entry).await {
                Ok(()) => chain.commit(entry.clone()).map(|()| {
                    durable_head = entry.entry_hash().to_owned();
                    entry
                }),
                Err(err) => {
                    warn!(error = %err, entry_id = %entry.entry_id(), "ledger store rejected entry");
                    Err(err)
                }
            }
        } else {
            warn!(
                durable_head = %durable_head,
                chain_head = entry.previous_hash(),
                "working copy diverged from the store; append refused"
            );
            Err(LedgerError::StaleAppend {
                expected: durable_head.clone(),
                found: entry.previous_hash().to_owned(),
            })
        };
        // The caller may have gone away; the entry is durable either way.
        let _ = command.reply.send(result);
    }
    debug!("ledger writer stopped");
}

/// Cloneable front-end to a running [`LedgerWriter`].
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<AppendCommand>,
    chain: Arc<LedgerChain>,
}

impl LedgerHandle {
    /// Queues an append and waits until it is persisted and committed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WriterClosed`] if the writer task has stopped,
    /// or the storage error that prevented the append.
    pub async fn append(
        &self,
        event_type: impl Into<String>,
        data: Map<String, Value>,
    ) -> LedgerResult<LedgerEntry> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(AppendCommand {
                event_type: event_type.into(),
                data,
                reply,
            })
            .await
            .map_err(|_| LedgerError::WriterClosed)?;
        response.await.map_err(|_| LedgerError::WriterClosed)?
    }

    /// Verifies the working copy.
    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        self.chain.verify_integrity()
    }

    /// Number of committed entries including genesis.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a chain holds at least its genesis entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Hash of the newest committed entry.
    #[must_use]
    pub fn head_hash(&self) -> String {
        self.chain.head_hash()
    }

    /// Copy of every committed entry, genesis first.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.chain.entries()
    }

    /// Finds a committed entry by id.
    #[must_use]
    pub fn get_entry(&self, entry_id: EntryId) -> Option<LedgerEntry> {
        self.chain.get_entry(entry_id)
    }

    /// Committed entries with the given event type, in chain order.
    #[must_use]
    pub fn get_entries_by_type(&self, event_type: &str) -> Vec<LedgerEntry> {
        self.chain.get_entries_by_type(event_type)
    }
}

#[async_trait]
impl LedgerAppender for LedgerHandle {
    async fn append_event(
        &self,
        event_type: &str,
        data: Map<String, Value>,
    ) -> LedgerResult<LedgerEntry> {
        self.append(event_type, data).await
    }
}
