//! Wires configuration into a running decision service.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use mxp_governance::config::GovernanceConfig;
use mxp_governance::governance::{DecisionService, Ed25519Signer};
use mxp_governance::ledger::{
    FileLedgerStore, LedgerHandle, LedgerStore, LedgerWriter, LedgerWriterConfig,
    MemoryLedgerStore,
};
use mxp_governance::policy::{PolicyDocument, PolicyEngine, PolicyMode};
use tokio::task::JoinHandle;
use tracing::info;

pub struct Runtime {
    pub service: DecisionService,
    pub ledger: LedgerHandle,
    pub default_mode: PolicyMode,
    writer: JoinHandle<()>,
}

impl Runtime {
    /// Builds one engine per mode from the same document, opens the ledger,
    /// and attaches the signer when a seed is configured.
    pub async fn build(config: &GovernanceConfig) -> Result<Self> {
        let document = match &config.policy.document {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading policy document {}", path.display()))?;
                Some(PolicyDocument::from_json_str(&json)?)
            }
            None => None,
        };

        let store: Arc<dyn LedgerStore> = match &config.ledger.path {
            Some(path) => Arc::new(FileLedgerStore::open(path).await?),
            None => Arc::new(MemoryLedgerStore::new()),
        };
        let capacity = NonZeroUsize::new(config.ledger.queue_capacity)
            .context("ledger.queue_capacity must be greater than zero")?;
        let (ledger, writer) = LedgerWriter::open(store, LedgerWriterConfig::new(capacity)).await?;

        let ttl = Duration::try_minutes(config.tokens.ttl_minutes)
            .context("tokens.ttl_minutes is out of range")?;
        let strict = engine_for(PolicyMode::Strict, config, document.as_ref())?;
        let mut service = DecisionService::new(strict)
            .with_ledger(Arc::new(ledger.clone()))
            .with_token_ttl(ttl);
        for mode in [PolicyMode::Permissive, PolicyMode::Paranoid] {
            service.set_engine(mode, engine_for(mode, config, document.as_ref())?);
        }
        if let Some(seed) = config.signing.seed_bytes()? {
            let signer = Ed25519Signer::from_seed(seed);
            info!(public_key = %signer.public_key_hex(), "decision signing enabled");
            service.set_signer(Arc::new(signer));
        }

        info!(
            ledger_entries = ledger.len(),
            default_mode = %config.policy.mode,
            "governance runtime ready"
        );
        Ok(Self {
            service,
            ledger,
            default_mode: config.policy.mode,
            writer,
        })
    }

    /// Drops every sender and waits for queued appends to land.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            service,
            ledger,
            writer,
            ..
        } = self;
        drop(service);
        drop(ledger);
        writer.await.context("ledger writer panicked")?;
        Ok(())
    }
}

/// The document's own mode is overridden so each engine answers for `mode`.
fn engine_for(
    mode: PolicyMode,
    config: &GovernanceConfig,
    document: Option<&PolicyDocument>,
) -> Result<Arc<PolicyEngine>> {
    let engine = PolicyEngine::with_strategy(mode, config.policy.matching);
    if let Some(document) = document {
        engine.load_policy(document.clone())?;
        engine.set_mode(mode);
    }
    Ok(Arc::new(engine))
}
