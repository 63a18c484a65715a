//! Contract Test: Enablement
//!
//! This test verifies how targets are located and re-enabled.
//!
//! Constraints verified:
//! - The inbound id is preferred over the port
//! - Port lookup takes the lowest id unless the policy requires uniqueness
//! - The reported inbound count is the number of distinct inbounds written
//! - Targets that cannot be applied are reported, not failed
//!
//! If this test fails, clients are enabled in the wrong inbound.

mod common;

use common::*;
use serde_json::json;
use xuim_core::config::PortPolicy;
use xuim_core::engine::SkipReason;
use xuim_core::model::{InboundScope, NO_EMAIL};
use xuim_core::EnableTarget;

#[tokio::test]
async fn enables_by_inbound_id() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([disabled_client("a@x"), disabled_client("b@x")])),
        inbound(2, 443, json!([disabled_client("a@x")])),
    ])
    .await;
    let engine = engine_over(&store);

    let outcome = engine
        .enable_clients(&[EnableTarget::in_inbound(2, 443, "a@x")])
        .await
        .unwrap();

    assert_eq!(outcome.clients_enabled, 1);
    assert_eq!(outcome.inbounds_modified, 1);
    assert_eq!(client_in(&store, 2, "a@x").await.unwrap()["enable"], true);
    assert_eq!(client_in(&store, 1, "a@x").await.unwrap()["enable"], false);
}

#[tokio::test]
async fn counts_distinct_inbounds() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([disabled_client("a@x"), disabled_client("b@x")])),
        inbound(2, 8443, json!([disabled_client("c@x")])),
    ])
    .await;
    let engine = engine_over(&store);

    let inactive = engine.find_inactive(InboundScope::All).await.unwrap();
    let targets: Vec<_> = inactive
        .iter()
        .map(|c| EnableTarget::in_inbound(c.inbound_id, c.port, c.email.clone()))
        .collect();

    let outcome = engine.enable_clients(&targets).await.unwrap();
    assert_eq!(outcome.clients_enabled, 3);
    assert_eq!(outcome.inbounds_modified, 2);
    assert!(outcome.skipped.is_empty());
    assert!(engine.find_inactive(InboundScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn port_fallback_takes_lowest_id() {
    let store = seeded_store(vec![
        inbound(5, 443, json!([disabled_client("a@x")])),
        inbound(3, 443, json!([disabled_client("a@x")])),
    ])
    .await;
    let engine = engine_with_policy(&store, PortPolicy::FirstMatch);

    let outcome = engine
        .enable_clients(&[EnableTarget::on_port(443, "a@x")])
        .await
        .unwrap();

    assert_eq!(outcome.clients_enabled, 1);
    assert_eq!(client_in(&store, 3, "a@x").await.unwrap()["enable"], true);
    assert_eq!(client_in(&store, 5, "a@x").await.unwrap()["enable"], false);
}

#[tokio::test]
async fn require_unique_skips_shared_ports() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([disabled_client("a@x")])),
        inbound(2, 443, json!([disabled_client("a@x")])),
        inbound(3, 80, json!([disabled_client("b@x")])),
    ])
    .await;
    let engine = engine_with_policy(&store, PortPolicy::RequireUnique);

    let outcome = engine
        .enable_clients(&[
            EnableTarget::on_port(443, "a@x"),
            EnableTarget::on_port(80, "b@x"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.clients_enabled, 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(
        outcome.skipped[0].reason,
        SkipReason::AmbiguousPort {
            candidates: vec![1, 2]
        }
    );
    assert_eq!(client_in(&store, 3, "b@x").await.unwrap()["enable"], true);
}

#[tokio::test]
async fn unresolvable_targets_are_reported() {
    let store = seeded_store(vec![
        inbound(1, 443, json!([client("enabled@x", 0)])),
        xuim_core::InboundRow::new(2, None, 8443, "{broken"),
    ])
    .await;
    let engine = engine_over(&store);

    let outcome = engine
        .enable_clients(&[
            EnableTarget::in_inbound(9, 443, "a@x"),
            EnableTarget::on_port(1234, "a@x"),
            EnableTarget::in_inbound(2, 8443, "a@x"),
            EnableTarget::in_inbound(1, 443, "enabled@x"),
        ])
        .await
        .unwrap();

    let reasons: Vec<_> = outcome.skipped.iter().map(|s| s.reason.clone()).collect();
    assert_eq!(
        reasons,
        vec![
            SkipReason::InboundNotFound,
            SkipReason::NoInboundOnPort,
            SkipReason::UnreadableSettings,
            SkipReason::NoDisabledClient,
        ]
    );
    assert_eq!(outcome.inbounds_modified, 0);
    assert_eq!(outcome.clients_enabled, 0);
}

#[tokio::test]
async fn identity_less_clients_are_not_enabled() {
    let store = seeded_store(vec![inbound(
        1,
        443,
        json!([{"enable": false, "expiryTime": 0}, disabled_client("a@x")]),
    )])
    .await;
    let engine = engine_over(&store);

    let inactive = engine.find_inactive(InboundScope::All).await.unwrap();
    let targets: Vec<_> = inactive
        .iter()
        .map(|c| EnableTarget::in_inbound(c.inbound_id, c.port, c.email.clone()))
        .collect();
    assert_eq!(targets.len(), 2);

    let outcome = engine.enable_clients(&targets).await.unwrap();
    assert_eq!(outcome.clients_enabled, 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].target.email, NO_EMAIL);
    assert_eq!(outcome.skipped[0].reason, SkipReason::NoIdentity);
    assert_eq!(clients_of(&store, 1).await[0]["enable"], false);
}
