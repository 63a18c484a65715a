//! Fixtures and test doubles for contract tests
//!
//! Provides panel fixtures over the in-memory store, a SQLite fixture in a
//! temporary directory, and a store wrapper that injects a failure into the
//! Nth settings write so rollback can be observed.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use xuim_core::config::{EngineConfig, PortPolicy, StoreConfig};
use xuim_core::error::{Error, Result};
use xuim_core::model::{InboundRow, InboundScope, InboundSummary, TrafficCounters, TrafficEntry};
use xuim_core::store::{MemoryStore, SqliteStore};
use xuim_core::traits::{PanelStore, StoreTransaction};
use xuim_core::SubscriptionEngine;

/// Reference instant used across tests (2023-11-14T22:13:20Z)
pub const NOW: i64 = 1_700_000_000;

/// Seconds in `n` days
pub fn days(n: i64) -> i64 {
    n * 86_400
}

/// Inbound row whose settings embed `clients` next to protocol keys
pub fn inbound(id: i64, port: i64, clients: Value) -> InboundRow {
    let settings = json!({
        "clients": clients,
        "decryption": "none",
        "fallbacks": [{"dest": 8080}]
    });
    InboundRow::new(id, Some(&format!("inbound-{}", id)), port, settings.to_string())
}

/// Client entry with an explicit expiry
pub fn client(email: &str, expiry_time_ms: i64) -> Value {
    json!({
        "id": format!("uuid-{}", email),
        "email": email,
        "flow": "xtls-rprx-vision",
        "expiryTime": expiry_time_ms,
        "enable": true
    })
}

/// Disabled client entry
pub fn disabled_client(email: &str) -> Value {
    json!({
        "id": format!("uuid-{}", email),
        "email": email,
        "expiryTime": 0,
        "enable": false
    })
}

/// Memory store seeded with `rows`
pub async fn seeded_store(rows: Vec<InboundRow>) -> MemoryStore {
    let store = MemoryStore::new();
    for row in rows {
        store.insert_inbound(row).await;
    }
    store
}

/// Seed a ledger row
pub async fn seed_ledger(store: &MemoryStore, email: &str, down: i64, up: i64, all_time: i64) {
    store
        .insert_traffic(TrafficEntry::new(email, TrafficCounters { down, up, all_time }))
        .await;
}

/// Engine sharing `store`'s tables
pub fn engine_over(store: &MemoryStore) -> SubscriptionEngine {
    SubscriptionEngine::with_store(Box::new(store.clone()))
}

/// Engine sharing `store`'s tables with a port policy
pub fn engine_with_policy(store: &MemoryStore, port_policy: PortPolicy) -> SubscriptionEngine {
    SubscriptionEngine::new(
        Box::new(store.clone()),
        EngineConfig {
            port_policy,
            ..EngineConfig::default()
        },
    )
}

/// Parsed settings document of inbound `id`
pub async fn settings_of(store: &MemoryStore, id: i64) -> Value {
    let row = store.inbound(id).await.expect("inbound exists");
    serde_json::from_str(&row.settings).expect("settings are JSON")
}

/// Embedded clients of inbound `id`
pub async fn clients_of(store: &MemoryStore, id: i64) -> Vec<Value> {
    settings_of(store, id).await["clients"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

/// Embedded client `email` in inbound `id`
pub async fn client_in(store: &MemoryStore, id: i64, email: &str) -> Option<Value> {
    clients_of(store, id)
        .await
        .into_iter()
        .find(|c| c["email"] == email)
}

/// SQLite database file in `dir` with the panel tables created
pub async fn sqlite_fixture(dir: &tempfile::TempDir) -> SqliteStore {
    let store = SqliteStore::connect(&StoreConfig::Sqlite {
        path: dir.path().join("x-ui.db"),
        busy_timeout_secs: 1,
        max_connections: 1,
        create_if_missing: true,
    })
    .await
    .expect("sqlite store opens");
    store.create_schema().await.expect("schema created");
    store
}

/// Insert an inbound row straight into a SQLite fixture
pub async fn sqlite_insert_inbound(store: &SqliteStore, row: &InboundRow) {
    sqlx::query("INSERT INTO inbounds (id, remark, port, settings) VALUES (?, ?, ?, ?)")
        .bind(row.id)
        .bind(row.remark.as_deref())
        .bind(row.port)
        .bind(&row.settings)
        .execute(store.pool())
        .await
        .expect("inbound inserted");
}

/// A store that fails the Nth `update_settings` call across all
/// transactions
pub struct FaultyStore {
    inner: MemoryStore,
    fail_on_update: usize,
    updates: Arc<AtomicUsize>,
}

impl FaultyStore {
    /// Wrap `inner`, failing the `fail_on_update`th settings write (1-based)
    pub fn new(inner: MemoryStore, fail_on_update: usize) -> Self {
        Self {
            inner,
            fail_on_update,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of settings writes attempted
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PanelStore for FaultyStore {
    async fn list_inbounds(&self) -> Result<Vec<InboundSummary>> {
        self.inner.list_inbounds().await
    }

    async fn fetch_inbounds(&self, scope: InboundScope) -> Result<Vec<InboundRow>> {
        self.inner.fetch_inbounds(scope).await
    }

    async fn get_traffic(&self, email: &str) -> Result<Option<TrafficEntry>> {
        self.inner.get_traffic(email).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fail_on_update: self.fail_on_update,
            updates: Arc::clone(&self.updates),
        }))
    }

    fn store_name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_on_update: usize,
    updates: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn fetch_inbounds(&mut self, scope: InboundScope) -> Result<Vec<InboundRow>> {
        self.inner.fetch_inbounds(scope).await
    }

    async fn fetch_inbounds_by_port(&mut self, port: i64) -> Result<Vec<InboundRow>> {
        self.inner.fetch_inbounds_by_port(port).await
    }

    async fn get_traffic(&mut self, email: &str) -> Result<Option<TrafficEntry>> {
        self.inner.get_traffic(email).await
    }

    async fn update_settings(&mut self, inbound_id: i64, settings: &str) -> Result<()> {
        let attempt = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on_update {
            return Err(Error::store("disk I/O error"));
        }
        self.inner.update_settings(inbound_id, settings).await
    }

    async fn insert_traffic(&mut self, entry: &TrafficEntry) -> Result<()> {
        self.inner.insert_traffic(entry).await
    }

    async fn update_traffic(&mut self, entry: &TrafficEntry) -> Result<()> {
        self.inner.update_traffic(entry).await
    }

    async fn delete_traffic(&mut self, email: &str) -> Result<u64> {
        self.inner.delete_traffic(email).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}
