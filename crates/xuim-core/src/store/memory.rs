// # Memory Store
//
// In-memory implementation of PanelStore.
//
// ## Purpose
//
// Provides a fast store with the same transactional behavior as the SQLite
// gateway. Useful for tests and for embedding the engine over data that
// was loaded from elsewhere.
//
// ## Transaction Behavior
//
// - `begin()` takes the store lock and works on a private copy
// - `commit()` swaps the copy in; dropping the transaction discards it
// - Only one transaction is open at a time; reads through the store
//   itself wait while a transaction holds the lock

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::Error;
use crate::model::{InboundRow, InboundScope, InboundSummary, TrafficCounters, TrafficEntry};
use crate::traits::store::{PanelStore, StoreTransaction};

/// Tables held by the memory store
#[derive(Debug, Clone, Default)]
struct Tables {
    inbounds: BTreeMap<i64, InboundRow>,
    traffic: BTreeMap<String, TrafficCounters>,
}

impl Tables {
    fn inbounds_in(&self, scope: InboundScope) -> Vec<InboundRow> {
        self.inbounds
            .values()
            .filter(|row| scope.includes(row.id))
            .cloned()
            .collect()
    }

    fn traffic_for(&self, email: &str) -> Option<TrafficEntry> {
        self.traffic
            .get(email)
            .map(|counters| TrafficEntry::new(email, *counters))
    }
}

/// In-memory store implementation
///
/// # Example
///
/// ```rust,no_run
/// use xuim_core::model::InboundRow;
/// use xuim_core::store::MemoryStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryStore::new();
///     store
///         .insert_inbound(InboundRow::new(1, Some("vless"), 443, r#"{"clients":[]}"#))
///         .await;
///     assert_eq!(store.inbound_count().await, 1);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an inbound row
    pub async fn insert_inbound(&self, row: InboundRow) {
        let mut guard = self.inner.lock().await;
        guard.inbounds.insert(row.id, row);
    }

    /// Insert or replace a ledger row
    pub async fn insert_traffic(&self, entry: TrafficEntry) {
        let mut guard = self.inner.lock().await;
        guard.traffic.insert(entry.email, entry.counters);
    }

    /// Get an inbound row by id
    pub async fn inbound(&self, id: i64) -> Option<InboundRow> {
        self.inner.lock().await.inbounds.get(&id).cloned()
    }

    /// Get the number of inbounds in the store
    pub async fn inbound_count(&self) -> usize {
        self.inner.lock().await.inbounds.len()
    }

    /// Get the number of ledger rows in the store
    pub async fn traffic_count(&self) -> usize {
        self.inner.lock().await.traffic.len()
    }
}

#[async_trait]
impl PanelStore for MemoryStore {
    async fn list_inbounds(&self) -> Result<Vec<InboundSummary>, Error> {
        let guard = self.inner.lock().await;
        Ok(guard.inbounds.values().map(InboundRow::summary).collect())
    }

    async fn fetch_inbounds(&self, scope: InboundScope) -> Result<Vec<InboundRow>, Error> {
        Ok(self.inner.lock().await.inbounds_in(scope))
    }

    async fn get_traffic(&self, email: &str) -> Result<Option<TrafficEntry>, Error> {
        Ok(self.inner.lock().await.traffic_for(email))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, Error> {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Transaction over a private copy of the tables
struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn fetch_inbounds(&mut self, scope: InboundScope) -> Result<Vec<InboundRow>, Error> {
        Ok(self.working.inbounds_in(scope))
    }

    async fn fetch_inbounds_by_port(&mut self, port: i64) -> Result<Vec<InboundRow>, Error> {
        Ok(self
            .working
            .inbounds
            .values()
            .filter(|row| row.port == port)
            .cloned()
            .collect())
    }

    async fn get_traffic(&mut self, email: &str) -> Result<Option<TrafficEntry>, Error> {
        Ok(self.working.traffic_for(email))
    }

    async fn update_settings(&mut self, inbound_id: i64, settings: &str) -> Result<(), Error> {
        let row = self
            .working
            .inbounds
            .get_mut(&inbound_id)
            .ok_or_else(|| Error::store(format!("inbound {} not found", inbound_id)))?;
        row.settings = settings.to_string();
        Ok(())
    }

    async fn insert_traffic(&mut self, entry: &TrafficEntry) -> Result<(), Error> {
        self.working
            .traffic
            .insert(entry.email.clone(), entry.counters);
        Ok(())
    }

    async fn update_traffic(&mut self, entry: &TrafficEntry) -> Result<(), Error> {
        let counters = self
            .working
            .traffic
            .get_mut(&entry.email)
            .ok_or_else(|| Error::store(format!("no traffic row for {}", entry.email)))?;
        *counters = entry.counters;
        Ok(())
    }

    async fn delete_traffic(&mut self, email: &str) -> Result<u64, Error> {
        Ok(u64::from(self.working.traffic.remove(email).is_some()))
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}
