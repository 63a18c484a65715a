// # Store Gateway Implementations
//
// This module provides implementations of the PanelStore trait for
// different backends.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::PanelStore;

/// Open the store described by `config`
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn PanelStore>> {
    config.validate()?;

    let store: Box<dyn PanelStore> = match config {
        StoreConfig::Sqlite { .. } => Box::new(SqliteStore::connect(config).await?),
        StoreConfig::Memory => Box::new(MemoryStore::new()),
    };

    tracing::debug!("Opened {} store", store.store_name());
    Ok(store)
}
