//! Contract Test: Deletion Cascade
//!
//! This test verifies that deleting a client removes every trace of it.
//!
//! Constraints verified:
//! - A client is removed from every inbound where it appears
//! - Its ledger row is removed
//! - Other clients and sibling settings keys are untouched
//! - Deleting again is a no-op that reports zero
//! - An empty deletion set is rejected
//! - Clients without an identity are never matched, even when listed
//!
//! If this test fails, deleted clients linger in one representation.

mod common;

use common::*;
use serde_json::json;
use xuim_core::model::NO_EMAIL;
use xuim_core::{InboundScope, SubscriptionEngine};
use xuim_core::traits::PanelStore;

#[tokio::test]
async fn duplicate_client_is_removed_from_every_inbound() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([client("dup@x", 0), client("keep@x", 0)])),
        inbound(2, 8443, json!([client("dup@x", 0)])),
    ])
    .await;
    seed_ledger(&store, "dup@x", 1, 2, 3).await;
    let engine = engine_over(&store);

    let outcome = engine.delete_clients(["dup@x"]).await.unwrap();
    assert_eq!(outcome.removed, 2);
    assert_eq!(outcome.inbounds_rewritten, 2);
    assert_eq!(outcome.ledger_rows_deleted, 1);

    assert_eq!(clients_of(&store, 1).await.len(), 1);
    assert!(client_in(&store, 1, "keep@x").await.is_some());
    assert!(clients_of(&store, 2).await.is_empty());
    assert!(store.get_traffic("dup@x").await.unwrap().is_none());

    let settings = settings_of(&store, 2).await;
    assert_eq!(settings["fallbacks"], json!([{"dest": 8080}]));
}

#[tokio::test]
async fn second_deletion_reports_zero() {
    let store = seeded_store(vec![inbound(1, 443, json!([client("a@x", 0)]))]).await;
    seed_ledger(&store, "a@x", 0, 0, 0).await;
    let engine = engine_over(&store);

    engine.delete_clients(["a@x"]).await.unwrap();
    let again = engine.delete_clients(["a@x"]).await.unwrap();

    assert_eq!(again.removed, 0);
    assert_eq!(again.inbounds_rewritten, 0);
    assert_eq!(again.ledger_rows_deleted, 0);
}

#[tokio::test]
async fn identity_fallback_is_shared_with_other_engines() {
    let store = seeded_store(vec![inbound(
        1,
        443,
        json!([{"id": "uuid-1"}, {"email": "", "emailAddress": "b@x"}, {"email": "c@x"}]),
    )])
    .await;
    let engine = engine_over(&store);

    let outcome = engine.delete_clients(["uuid-1", "b@x"]).await.unwrap();
    assert_eq!(outcome.removed, 2);
    assert_eq!(clients_of(&store, 1).await, vec![json!({"email": "c@x"})]);
}

#[tokio::test]
async fn empty_set_is_invalid_input() {
    let store = seeded_store(vec![]).await;
    let engine = engine_over(&store);

    let err = engine.delete_clients(Vec::<String>::new()).await.unwrap_err();
    assert!(err.is_invalid_input());

    let err = engine.delete_clients([""]).await.unwrap_err();
    assert!(err.is_invalid_input());
}

#[tokio::test]
async fn expired_clients_can_be_bulk_deleted() {
    let store = seeded_store(vec![inbound(
        1,
        443,
        json!([
            client("old@x", (NOW - days(60)) * 1000),
            client("new@x", (NOW + days(10)) * 1000),
        ]),
    )])
    .await;
    let engine = engine_over(&store);

    let expired = engine
        .find_expired(NOW, 30, None, InboundScope::All)
        .await
        .unwrap();
    let outcome = engine
        .delete_clients(expired.into_iter().map(|c| c.email))
        .await
        .unwrap();

    assert_eq!(outcome.removed, 1);
    assert!(client_in(&store, 1, "new@x").await.is_some());
}

#[tokio::test]
async fn failure_leaves_every_inbound_intact() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([client("dup@x", 0)])),
        inbound(2, 8443, json!([client("dup@x", 0)])),
    ])
    .await;
    seed_ledger(&store, "dup@x", 1, 1, 2).await;

    let faulty = FaultyStore::new(store.clone(), 2);
    let engine = SubscriptionEngine::with_store(Box::new(faulty));

    let err = engine.delete_clients(["dup@x"]).await.unwrap_err();
    assert!(err.to_string().starts_with("delete_clients failed for dup@x"));

    assert_eq!(clients_of(&store, 1).await.len(), 1);
    assert_eq!(clients_of(&store, 2).await.len(), 1);
    assert!(store.get_traffic("dup@x").await.unwrap().is_some());
}

#[tokio::test]
async fn identity_less_clients_survive_bulk_deletion() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([{"expiryTime": (NOW - days(60)) * 1000}])),
        inbound(2, 8443, json!([{"expiryTime": 0, "flow": "xtls-rprx-vision"}, client("keep@x", 0)])),
    ])
    .await;
    let engine = engine_over(&store);

    let expired = engine.find_expired(NOW, 30, None, InboundScope::All).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].email, NO_EMAIL);

    let err = engine
        .delete_clients(expired.into_iter().map(|c| c.email))
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());

    assert_eq!(clients_of(&store, 1).await.len(), 1);
    assert_eq!(clients_of(&store, 2).await.len(), 2);
}

#[tokio::test]
async fn named_deletion_skips_identity_less_clients() {
    let store = seeded_store(vec![inbound(
        1,
        443,
        json!([{"expiryTime": 0}, client("gone@x", 0), {"email": "", "id": null}]),
    )])
    .await;
    let engine = engine_over(&store);

    let outcome = engine.delete_clients(["gone@x"]).await.unwrap();
    assert_eq!(outcome.removed, 1);
    assert_eq!(
        clients_of(&store, 1).await,
        vec![json!({"expiryTime": 0}), json!({"email": "", "id": null})]
    );
}
