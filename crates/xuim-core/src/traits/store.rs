// # Store Gateway Traits
//
// Defines the interface to the relational store shared with the panel.
//
// ## Purpose
//
// The gateway owns connection handling and statement execution. Engines
// never see SQL; they read rows and write back through a transaction.
//
// ## Implementations
//
// - SQLite (the panel's own database): `store::SqliteStore`
// - In-memory: `store::MemoryStore`
//
// ## Usage
//
// ```rust,ignore
// use xuim_core::PanelStore;
//
// let mut txn = store.begin().await?;
// let inbounds = txn.fetch_inbounds(InboundScope::All).await?;
// txn.update_settings(inbounds[0].id, "{\"clients\":[]}").await?;
// txn.commit().await?;
// ```

use async_trait::async_trait;

use crate::model::{InboundRow, InboundScope, InboundSummary, TrafficEntry};

/// Trait for store gateway implementations
///
/// # Transactions
///
/// Every mutation engine opens exactly one transaction with [`begin`],
/// performs all of its reads and writes through it, and calls
/// [`StoreTransaction::commit`] once. Dropping a transaction without
/// committing discards every write made through it.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Open and pool connections to the backing store
/// - ✅ Execute statements against `inbounds` and `client_traffics`
/// - ✅ Map driver failures into [`crate::Error`]
///
/// ## Forbidden Capabilities
/// - ❌ Interpret `settings` JSON (owned by the engines)
/// - ❌ Decide which clients to touch (owned by the engines)
/// - ❌ Commit on behalf of a caller
///
/// [`begin`]: PanelStore::begin
#[async_trait]
pub trait PanelStore: Send + Sync {
    /// List every inbound without its settings payload
    async fn list_inbounds(&self) -> Result<Vec<InboundSummary>, crate::Error>;

    /// Fetch inbound rows, ordered by id
    ///
    /// Read-only; used by the classifier. No lock is held after return.
    async fn fetch_inbounds(&self, scope: InboundScope) -> Result<Vec<InboundRow>, crate::Error>;

    /// Fetch the ledger row for an email
    async fn get_traffic(&self, email: &str) -> Result<Option<TrafficEntry>, crate::Error>;

    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;

    /// Release held connections; later calls may fail
    async fn close(&self) {}
}

/// One open transaction
///
/// Implementations must roll back when dropped without [`commit`].
///
/// [`commit`]: StoreTransaction::commit
#[async_trait]
pub trait StoreTransaction: Send {
    /// Fetch inbound rows, ordered by id
    async fn fetch_inbounds(&mut self, scope: InboundScope)
    -> Result<Vec<InboundRow>, crate::Error>;

    /// Fetch every inbound listening on `port`, ordered by id
    async fn fetch_inbounds_by_port(&mut self, port: i64) -> Result<Vec<InboundRow>, crate::Error>;

    /// Fetch the ledger row for an email
    async fn get_traffic(&mut self, email: &str) -> Result<Option<TrafficEntry>, crate::Error>;

    /// Replace the `settings` column of one inbound
    async fn update_settings(&mut self, inbound_id: i64, settings: &str)
    -> Result<(), crate::Error>;

    /// Insert a new ledger row
    async fn insert_traffic(&mut self, entry: &TrafficEntry) -> Result<(), crate::Error>;

    /// Overwrite the counters of an existing ledger row
    async fn update_traffic(&mut self, entry: &TrafficEntry) -> Result<(), crate::Error>;

    /// Delete every ledger row for an email
    ///
    /// Returns the number of rows deleted.
    async fn delete_traffic(&mut self, email: &str) -> Result<u64, crate::Error>;

    /// Make every write in this transaction durable
    async fn commit(self: Box<Self>) -> Result<(), crate::Error>;

    /// Discard every write in this transaction
    async fn rollback(self: Box<Self>) -> Result<(), crate::Error>;
}
