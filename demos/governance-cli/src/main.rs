//! Command-line front-end for the governance decision service.

mod runtime;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mxp_governance::config::GovernanceConfig;
use mxp_governance::governance::{DecisionRequest, RiskLevel};
use mxp_governance::ledger::{FileLedgerStore, IntegrityReport, LedgerEntry, verify_entries};
use mxp_governance::policy::PolicyMode;
use mxp_governance::telemetry::init_tracing;
use tracing::{info, warn};

use runtime::Runtime;

#[derive(Parser)]
#[command(name = "governance")]
#[command(about = "Evaluate agent actions against policy and audit the result", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide one request and print the response as JSON
    Decide {
        /// Requesting actor
        #[arg(long, required_unless_present = "request")]
        actor: Option<String>,
        /// Proposed action
        #[arg(long, required_unless_present = "request")]
        action: Option<String>,
        /// Tool the action targets
        #[arg(long, required_unless_present = "request")]
        tool: Option<String>,
        /// Policy mode (defaults to the configured mode)
        #[arg(long)]
        mode: Option<PolicyMode>,
        /// Risk level from 1 to 5
        #[arg(long, default_value_t = 1)]
        risk: u8,
        /// Data class touched by the request (repeatable)
        #[arg(long = "data-class")]
        data_classes: Vec<String>,
        /// Read a full JSON request from a file instead
        #[arg(long, conflicts_with_all = ["actor", "action", "tool"])]
        request: Option<PathBuf>,
    },
    /// Print the current policy hash for each mode
    Hash,
    /// Verify a JSONL ledger file and print the integrity report
    VerifyLedger {
        /// Ledger file (defaults to the configured path)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GovernanceConfig::resolve(cli.config.as_deref())?;
    if let Err(err) = init_tracing(&config.telemetry) {
        eprintln!("tracing disabled: {err}");
    }

    match cli.command {
        Commands::Decide {
            actor,
            action,
            tool,
            mode,
            risk,
            data_classes,
            request,
        } => {
            let runtime = Runtime::build(&config).await?;
            let request = match request {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading request {}", path.display()))?;
                    DecisionRequest::from_json_str(&json)?
                }
                None => DecisionRequest::new(
                    actor.unwrap_or_default(),
                    action.unwrap_or_default(),
                    tool.unwrap_or_default(),
                )
                .with_policy_mode(mode.unwrap_or(runtime.default_mode))
                .with_risk_level(RiskLevel::new(risk)?)
                .with_data_classes(data_classes),
            };
            let response = runtime.service.decide(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            runtime.shutdown().await?;
        }
        Commands::Hash => {
            let runtime = Runtime::build(&config).await?;
            for mode in [PolicyMode::Strict, PolicyMode::Permissive, PolicyMode::Paranoid] {
                if let Some(engine) = runtime.service.engine(mode) {
                    println!("{mode}\t{}", engine.get_policy_hash());
                }
            }
            runtime.shutdown().await?;
        }
        Commands::VerifyLedger { path } => {
            let path = path
                .or(config.ledger.path)
                .context("no ledger path given and none configured")?;
            let entries = FileLedgerStore::read_entries(&path)
                .await
                .with_context(|| format!("reading ledger {}", path.display()))?;
            let report = verify_ledger(&entries)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.valid {
                warn!(path = %path.display(), entries = report.entries_verified, "ledger failed verification");
                bail!("ledger {} failed verification", path.display());
            }
            info!(path = %path.display(), entries = report.entries_verified, "ledger verified");
        }
    }
    Ok(())
}

/// Checks stored entries without touching the file they came from.
fn verify_ledger(entries: &[LedgerEntry]) -> Result<IntegrityReport> {
    if entries.is_empty() {
        bail!("ledger has no entries, not even a genesis entry");
    }
    Ok(verify_entries(entries))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mxp_governance::ledger::{LedgerChain, LedgerStore};
    use serde_json::Map;

    use super::*;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("governance-verify-{}.jsonl", uuid::Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn verifying_a_missing_ledger_leaves_no_file() {
        let path = temp_path();
        assert!(FileLedgerStore::read_entries(&path).await.is_err());
        assert!(!path.exists());
        assert!(verify_ledger(&[]).is_err());
    }

    #[tokio::test]
    async fn verifying_reports_without_writing() {
        let path = temp_path();
        let store = Arc::new(FileLedgerStore::open(&path).await.unwrap());
        let chain = LedgerChain::restore(store.as_ref()).await.unwrap();
        store
            .save_entry(&chain.append("decision", Map::new()))
            .await
            .unwrap();
        drop(store);
        let before = std::fs::read(&path).unwrap();

        let entries = FileLedgerStore::read_entries(&path).await.unwrap();
        let report = verify_ledger(&entries).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_verified, 2);
        assert_eq!(std::fs::read(&path).unwrap(), before);

        let contents = String::from_utf8(before).unwrap();
        std::fs::write(&path, contents.replace("\"decision\"", "\"policy_update\"")).unwrap();
        let entries = FileLedgerStore::read_entries(&path).await.unwrap();
        assert!(!verify_ledger(&entries).unwrap().valid);

        let _ = std::fs::remove_file(path);
    }
}
