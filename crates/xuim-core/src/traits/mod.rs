//! Core traits for the xuim engine
//!
//! - [`PanelStore`]: Connection-level access to the panel database
//! - [`StoreTransaction`]: One atomic unit of reads and writes

pub mod store;

pub use store::{PanelStore, StoreTransaction};
