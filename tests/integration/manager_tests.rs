//! Certificate manager integration tests
//!
//! Covers persistence around reconciliation: state is written only after a
//! successful outcome and removed only after deletion completes.

use chrono::TimeDelta;
use std::sync::Arc;

use leafcert_reconciler::config::DatabaseConfig;
use leafcert_reconciler::db::{self, SqliteStateStore};
use leafcert_reconciler::models::LeafCertificateConfig;
use leafcert_reconciler::services::{Action, OperationContext};
use leafcert_reconciler::{CertError, StateStore};

use crate::common::*;

fn ctx() -> OperationContext {
    OperationContext::new()
}

#[tokio::test]
async fn test_apply_creates_then_leaves_unchanged() {
    let harness = Harness::new();
    let (manager, store) = harness.manager();

    let first = manager
        .apply(&ctx(), "web", desired(ConfigFixtures::minimal()))
        .await
        .unwrap();
    assert_eq!(first.action, Action::Created);
    assert_eq!(store.load("web").await.unwrap(), Some(first.state.clone()));

    let second = manager
        .apply(&ctx(), "web", desired(ConfigFixtures::minimal()))
        .await
        .unwrap();
    assert_eq!(second.action, Action::Unchanged);
    assert_eq!(second.state.certificate, first.state.certificate);
    assert_eq!(harness.signer.sign_calls().len(), 1);
}

#[tokio::test]
async fn test_failed_apply_keeps_previous_state() {
    let harness = Harness::new();
    let (manager, store) = harness.manager();
    let created = manager
        .apply(&ctx(), "web", desired(ConfigFixtures::minimal()))
        .await
        .unwrap();

    harness
        .signer
        .set_error_mode(MockError::SignFailure("authority offline".to_string()));
    let config = LeafCertificateConfig {
        validity_period: "72h".to_string(),
        ..ConfigFixtures::minimal()
    };
    let err = manager
        .apply(&ctx(), "web", desired(config))
        .await
        .unwrap_err();

    assert!(matches!(err, CertError::Signing(_)));
    assert_eq!(store.load("web").await.unwrap(), Some(created.state));
}

#[tokio::test]
async fn test_refresh_unknown_identity() {
    let harness = Harness::new();
    let (manager, _store) = harness.manager();

    let err = manager.refresh(&ctx(), "missing").await.unwrap_err();
    assert!(matches!(err, CertError::NotFound(_)));
    assert!(harness.signer.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_persists_renewal() {
    let harness = Harness::new();
    let (manager, store) = harness.manager();
    let created = manager
        .apply(&ctx(), "web", desired(ConfigFixtures::with_early_renewal("4h")))
        .await
        .unwrap();

    harness.clock.advance(TimeDelta::hours(21));
    let outcome = manager.refresh(&ctx(), "web").await.unwrap();

    assert_eq!(outcome.action, Action::Renewed);
    let stored = store.load("web").await.unwrap().unwrap();
    assert_eq!(stored, outcome.state);
    assert_ne!(
        stored.certificate.cert_thumbprint_hex,
        created.state.certificate.cert_thumbprint_hex
    );
}

#[tokio::test]
async fn test_destroy_removes_state_despite_revoke_failure() {
    let harness = Harness::new();
    let (manager, store) = harness.manager();
    manager
        .apply(&ctx(), "web", desired(ConfigFixtures::minimal()))
        .await
        .unwrap();

    harness
        .signer
        .set_error_mode(MockError::RevokeFailure("503".to_string()));
    let diagnostics = manager.destroy(&ctx(), "web").await.unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert!(store.load("web").await.unwrap().is_none());
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_destroy_with_damaged_thumbprint_keeps_state() {
    let harness = Harness::new();
    let (manager, store) = harness.manager();
    let mut state = manager
        .apply(&ctx(), "web", desired(ConfigFixtures::minimal()))
        .await
        .unwrap()
        .state;
    state.certificate.cert_thumbprint_hex = "0011".to_string();
    store.save("web", &state).await.unwrap();

    let err = manager.destroy(&ctx(), "web").await.unwrap_err();
    assert!(matches!(err, CertError::Validation(_)));
    assert_eq!(manager.get("web").await.unwrap(), Some(state));
}

#[tokio::test]
async fn test_sqlite_backed_lifecycle() {
    let pool = db::init_pool(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .unwrap();
    let harness = Harness::new();
    let manager = harness.manager_with_store(Arc::new(SqliteStateStore::new(pool)));

    let created = manager
        .apply(&ctx(), "api", desired(ConfigFixtures::with_dns_san("api.test")))
        .await
        .unwrap();
    assert_eq!(manager.get("api").await.unwrap(), Some(created.state.clone()));

    let config = LeafCertificateConfig {
        validity_period: "48h".to_string(),
        ..ConfigFixtures::with_dns_san("api.test")
    };
    let replaced = manager.apply(&ctx(), "api", desired(config)).await.unwrap();
    assert_eq!(replaced.action, Action::Replaced);
    assert_eq!(manager.get("api").await.unwrap(), Some(replaced.state));
    assert_eq!(manager.list().await.unwrap(), vec!["api".to_string()]);

    manager.destroy(&ctx(), "api").await.unwrap();
    assert!(manager.get("api").await.unwrap().is_none());
}
