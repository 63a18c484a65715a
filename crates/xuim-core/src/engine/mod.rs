//! Subscription engine
//!
//! The SubscriptionEngine is responsible for:
//! - Listing inbounds and classifying their clients
//! - Reconciling traffic between the ledger and embedded client copies
//! - Shifting expiry dates
//! - Deleting clients from every inbound and from the ledger
//! - Re-enabling disabled clients
//!
//! ## Architecture
//!
//! ```text
//!                     ┌────────────────────┐
//!                     │ SubscriptionEngine │
//!                     └────────────────────┘
//!                        │              │
//!            read-only   │              │  mutations
//!                        ▼              ▼
//!              ┌──────────────┐  ┌──────────────────┐
//!              │  directory   │  │ StoreTransaction │
//!              │  + classify  │  │ (one per call)   │
//!              └──────────────┘  └──────────────────┘
//!                        │              │
//!                        └──────┬───────┘
//!                               ▼
//!                       ┌──────────────┐
//!                       │  PanelStore  │
//!                       └──────────────┘
//! ```
//!
//! ## Mutation Flow
//!
//! 1. Validate input; nothing touches the store on rejection
//! 2. Open one transaction
//! 3. Read, rewrite dirty inbounds, update the ledger
//! 4. Commit once; any error drops the transaction, rolling it back

mod deletion;
mod enablement;
mod expiry;
mod traffic;

pub use deletion::DeletionOutcome;
pub use enablement::{EnableOutcome, EnableTarget, SkipReason, SkippedTarget};
pub use expiry::{AdjustedClient, ExpiryAdjustment};
pub use traffic::TrafficUpdate;

use crate::classify::{self, ClientRef, ExpiredClient, NotStartedClient};
use crate::config::EngineConfig;
use crate::directory;
use crate::error::{Error, Result};
use crate::model::{InboundScope, InboundSummary};
use crate::traits::PanelStore;

/// Core subscription engine
///
/// Every operation takes `&self` and runs to completion on the calling
/// task. Mutations are serialized by the store's transactions.
pub struct SubscriptionEngine {
    /// Store gateway
    store: Box<dyn PanelStore>,

    /// Engine settings
    config: EngineConfig,
}

impl SubscriptionEngine {
    /// Create a new engine over `store`
    pub fn new(store: Box<dyn PanelStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Create an engine with default settings
    pub fn with_store(store: Box<dyn PanelStore>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    /// Store gateway
    pub fn store(&self) -> &dyn PanelStore {
        self.store.as_ref()
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Every inbound, ordered by id
    pub async fn list_inbounds(&self) -> Result<Vec<InboundSummary>> {
        self.store.list_inbounds().await
    }

    /// Clients expired for at least `min_days_expired` days
    pub async fn find_expired(
        &self,
        now: i64,
        min_days_expired: u32,
        name: Option<&str>,
        scope: InboundScope,
    ) -> Result<Vec<ExpiredClient>> {
        let records = directory::read_clients(self.store(), scope).await?;
        Ok(classify::find_expired(&records, now, min_days_expired, name))
    }

    /// Clients whose countdown has not started
    pub async fn find_not_started(
        &self,
        scope: InboundScope,
        name: Option<&str>,
    ) -> Result<Vec<NotStartedClient>> {
        let records = directory::read_clients(self.store(), scope).await?;
        Ok(classify::find_not_started(&records, name))
    }

    /// Clients without an expiry
    pub async fn find_unlimited(&self, scope: InboundScope) -> Result<Vec<ClientRef>> {
        let records = directory::read_clients(self.store(), scope).await?;
        Ok(classify::find_unlimited(&records))
    }

    /// Disabled clients
    pub async fn find_inactive(&self, scope: InboundScope) -> Result<Vec<ClientRef>> {
        let records = directory::read_clients(self.store(), scope).await?;
        Ok(classify::find_inactive(&records))
    }
}

/// Wrap a failure inside a mutation with its operation name and target
fn failed<'a>(operation: &'static str, target: &'a str) -> impl FnOnce(Error) -> Error + 'a {
    move |e| match e {
        Error::Operation { .. } => e,
        other => Error::operation(operation, target, other),
    }
}
