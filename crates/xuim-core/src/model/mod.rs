//! Data model for the panel's two representations
//!
//! - [`InboundRow`] / [`InboundSettings`]: the denormalized JSON blob per inbound
//! - [`ClientRecord`]: one embedded client, flattened
//! - [`TrafficEntry`]: the normalized `client_traffics` ledger row

pub mod client;
pub mod inbound;
pub mod settings;

pub use client::{
    ClientRecord, ExpiryState, NO_EMAIL, SECS_PER_DAY, client_identity, identity_matches,
    resolve_identity,
};
pub use inbound::{
    InboundRow, InboundScope, InboundSummary, TrafficCounters, TrafficEntry, carried_all_time,
};
pub use settings::{DecodeError, InboundSettings};
