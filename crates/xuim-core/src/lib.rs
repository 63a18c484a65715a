// # xuim-core
//
// Core library for reconciling x-ui panel subscriptions.
//
// ## Architecture Overview
//
// The panel keeps client state in two places inside one SQLite database:
// - **client_traffics**: normalized per-email traffic ledger
// - **inbounds.settings**: a JSON document per inbound embedding its clients
//
// This library keeps the two consistent under mutation:
// - **PanelStore / StoreTransaction**: Store gateway traits (SQLite, memory)
// - **directory**: Flattens every inbound's clients, skipping unreadable rows
// - **classify**: Expired / not-started / unlimited / inactive subsets
// - **SubscriptionEngine**: Traffic, expiry, deletion and enablement
//
// ## Design Principles
//
// 1. **Injected Clock**: Classification takes `now`; the core never reads a clock
// 2. **One Transaction per Mutation**: Commit once or leave the store untouched
// 3. **One Identity Resolver**: `email`, `emailAddress`, `id`, `<no-email>`
// 4. **Preserve the Blob**: Only `clients` is rewritten; siblings keep their order
// 5. **Library-First**: The `xuim` binary is a thin front end over this crate

pub mod classify;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod traits;
pub mod units;

// Re-export core types for convenience
pub use classify::{ClientRef, ExpiredClient, NotStartedClient};
pub use config::{EngineConfig, PortPolicy, StoreConfig, XuimConfig};
pub use engine::{
    DeletionOutcome, EnableOutcome, EnableTarget, ExpiryAdjustment, SubscriptionEngine,
    TrafficUpdate,
};
pub use error::{Error, Result};
pub use model::{ClientRecord, ExpiryState, InboundRow, InboundScope, InboundSummary, TrafficEntry};
pub use store::{MemoryStore, SqliteStore, open_store};
pub use traits::{PanelStore, StoreTransaction};
