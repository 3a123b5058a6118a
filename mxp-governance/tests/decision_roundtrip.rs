use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;

use mxp_governance::capability::CapabilityToken;
use mxp_governance::config::GovernanceConfig;
use mxp_governance::governance::{
    DECISION_EVENT, Decision, DecisionRequest, DecisionService, DecisionSigner, Ed25519Signer,
    GovernanceError, RiskLevel,
};
use mxp_governance::ledger::{
    FileLedgerStore, LedgerAppender, LedgerChain, LedgerError, LedgerStore, LedgerWriter,
    LedgerWriterConfig, MemoryLedgerStore,
};
use mxp_governance::policy::{PolicyEngine, PolicyMode};
use serde_json::{Map, json};

const POLICY: &str = r#"{
    "mode": "strict",
    "terms": [
        {"term_id": "actor:user", "term_type": "ACTOR", "label": "User"},
        {"term_id": "action:read", "term_type": "ACTION", "label": "Read"},
        {"term_id": "action:delete", "term_type": "ACTION", "label": "Delete"}
    ],
    "relations": [
        {"relation_type": "permits", "source": "actor:user", "target": "action:read"},
        {"relation_type": "forbids", "source": "actor:user", "target": "action:delete",
         "conditions": ["requires human approval"]}
    ]
}"#;

fn engine() -> Arc<PolicyEngine> {
    let engine = PolicyEngine::default();
    engine.load_policy_json(POLICY).unwrap();
    Arc::new(engine)
}

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("{name}-{}.jsonl", uuid::Uuid::new_v4()));
    path
}

#[test]
fn scenarios_a_and_b() {
    let engine = engine();

    let read = engine.evaluate("user", "read");
    assert!(read.is_permitted());
    assert_eq!(read.permits_count(), 1);
    assert_eq!(read.forbids_count(), 0);

    let delete = engine.evaluate("user", "delete");
    assert!(!delete.is_permitted());
    assert!(delete.reasoning().contains("prohibition"));

    let write = engine.evaluate("user", "write");
    assert!(!write.is_permitted());
    assert!(write.reasoning().contains("no explicit permission"));
}

#[test]
fn scenario_c_chain_linkage_and_snapshot() {
    let chain = LedgerChain::new();
    let mut data = Map::new();
    data.insert("a".into(), json!(1));
    let first = chain.append("decision", data.clone());
    let second = chain.append("decision", data);

    assert_eq!(second.previous_hash(), first.entry_hash());
    assert_eq!(chain.verify_integrity().entries_verified, 3);

    let value = chain.to_value().unwrap();
    let restored = LedgerChain::from_value(value).unwrap();
    assert_eq!(restored.entries(), chain.entries());
    assert!(restored.verify_integrity().valid);
}

#[test]
fn scenario_d_zero_ttl_token() {
    let token = CapabilityToken::create("search", "web_search", "hash1", 0);
    assert!(!token.is_valid());
}

#[tokio::test]
async fn permitted_decision_is_audited_signed_and_verifiable() {
    let engine = engine();
    let store = Arc::new(MemoryLedgerStore::new());
    let (ledger, _writer) = LedgerWriter::open(store.clone(), LedgerWriterConfig::default())
        .await
        .unwrap();
    let signer = Arc::new(Ed25519Signer::from_seed([3u8; 32]));
    let service = DecisionService::new(Arc::clone(&engine))
        .with_ledger(Arc::new(ledger.clone()))
        .with_signer(signer.clone() as Arc<dyn DecisionSigner>);

    let request = DecisionRequest::new("user", "read", "crm")
        .with_user_intent("look up a customer")
        .with_data_classes(["pii"])
        .with_risk_level(RiskLevel::new(3).unwrap());
    let response = service.decide(&request).await.unwrap();

    assert_eq!(response.decision(), Decision::Permit);
    assert_eq!(response.policy_version_hash(), engine.get_policy_hash());

    let token = response.capability_token().unwrap();
    assert_eq!(token.policy_version_hash(), response.policy_version_hash());
    assert!(service.verify_token(token.token_id(), "read", "crm"));
    assert!(!service.verify_token(token.token_id(), "delete", "crm"));

    let digest = response.signing_digest();
    assert!(signer.verify_hex(digest.as_bytes(), response.signature().unwrap()));

    let recorded = store.entries_by_type(DECISION_EVENT).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(response.ledger_entry_hash(), Some(recorded[0].entry_hash()));
    assert_eq!(recorded[0].data()["risk_level"], 3);
    assert_eq!(recorded[0].data()["data_classes"], json!(["pii"]));
    assert!(ledger.verify_integrity().valid);
}

#[tokio::test]
async fn denied_decision_is_recorded_without_token() {
    let chain = Arc::new(LedgerChain::new());
    let service =
        DecisionService::new(engine()).with_ledger(chain.clone() as Arc<dyn LedgerAppender>);

    let response = service
        .decide(&DecisionRequest::new("user", "delete", "crm"))
        .await
        .unwrap();

    assert_eq!(response.decision(), Decision::Deny);
    assert!(response.capability_token().is_none());
    let entry = chain.get_entries_by_type(DECISION_EVENT).remove(0);
    assert_eq!(entry.data()["decision"], "deny");
    assert!(entry.data()["token_id"].is_null());
    assert!(service.token_store().is_empty());
}

#[tokio::test]
async fn policy_reload_changes_token_binding() {
    let engine = engine();
    let service = DecisionService::new(Arc::clone(&engine));
    let before = service
        .decide(&DecisionRequest::new("user", "read", "crm"))
        .await
        .unwrap();

    engine
        .load_policy_json(
            r#"{"relations": [{"relation_type": "permits", "source": "actor:user", "target": "action:read:v2"}]}"#,
        )
        .unwrap();
    let after = service
        .decide(&DecisionRequest::new("user", "read", "crm"))
        .await
        .unwrap();

    assert_ne!(before.policy_version_hash(), after.policy_version_hash());
    assert_eq!(
        after.capability_token().unwrap().policy_version_hash(),
        engine.get_policy_hash()
    );
}

#[tokio::test]
async fn file_ledger_survives_restart() {
    let path = temp_path("governance-ledger");
    let hash = {
        let store = Arc::new(FileLedgerStore::open(&path).await.unwrap());
        let (ledger, writer) = LedgerWriter::open(store, LedgerWriterConfig::default())
            .await
            .unwrap();
        let service = DecisionService::new(engine()).with_ledger(Arc::new(ledger.clone()));
        let response = service
            .decide(&DecisionRequest::new("user", "read", "crm"))
            .await
            .unwrap();
        drop(service);
        drop(ledger);
        writer.await.unwrap();
        response.ledger_entry_hash().unwrap().to_owned()
    };

    let reopened = FileLedgerStore::open(&path).await.unwrap();
    let chain = LedgerChain::restore(&reopened).await.unwrap();
    assert_eq!(chain.head_hash(), hash);
    assert!(chain.verify_integrity().valid);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn tampered_journal_fails_restore() {
    let path = temp_path("governance-tamper");
    {
        let store = Arc::new(FileLedgerStore::open(&path).await.unwrap());
        let (ledger, writer) = LedgerWriter::open(store, LedgerWriterConfig::default())
            .await
            .unwrap();
        let service = DecisionService::new(engine()).with_ledger(Arc::new(ledger.clone()));
        service
            .decide(&DecisionRequest::new("user", "delete", "crm"))
            .await
            .unwrap();
        drop(service);
        drop(ledger);
        writer.await.unwrap();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replace("\"deny\"", "\"permit\"")).unwrap();

    let err = LedgerWriter::open(
        Arc::new(FileLedgerStore::open(&path).await.unwrap()),
        LedgerWriterConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LedgerError::Integrity(_)));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn config_drives_service_construction() {
    let config = GovernanceConfig::parse(
        "[policy]\nmode = \"permissive\"\n[tokens]\nttl_minutes = 1\n",
    )
    .unwrap();
    config.validate().unwrap();

    let engine = Arc::new(PolicyEngine::with_strategy(
        config.policy.mode,
        config.policy.matching,
    ));
    let service = DecisionService::new(engine)
        .with_token_ttl(Duration::minutes(config.tokens.ttl_minutes));

    let response = service
        .decide(
            &DecisionRequest::new("anyone", "anything", "tool")
                .with_policy_mode(PolicyMode::Permissive),
        )
        .await
        .unwrap();
    let token = response.capability_token().unwrap();
    assert_eq!((token.expiry() - token.granted_at()).num_minutes(), 1);

    let err = service
        .decide(&DecisionRequest::new("anyone", "anything", "tool"))
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::EngineUnavailable(PolicyMode::Strict)));
}
