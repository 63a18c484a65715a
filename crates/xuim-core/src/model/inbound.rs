// # Inbound and Ledger Rows
//
// Plain row types shared by the store gateway and the engines.

use serde::{Deserialize, Serialize};

/// One row of the `inbounds` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRow {
    /// Primary key
    pub id: i64,
    /// Display name (may be absent)
    pub remark: Option<String>,
    /// Listening port; not guaranteed unique across inbounds
    pub port: i64,
    /// Raw JSON text of the `settings` column
    pub settings: String,
}

impl InboundRow {
    /// Create a new inbound row
    pub fn new(id: i64, remark: Option<&str>, port: i64, settings: impl Into<String>) -> Self {
        Self {
            id,
            remark: remark.map(str::to_string),
            port,
            settings: settings.into(),
        }
    }

    /// Summary without the settings payload
    pub fn summary(&self) -> InboundSummary {
        InboundSummary {
            id: self.id,
            remark: self.remark.clone(),
            port: self.port,
        }
    }
}

/// `listInbounds` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSummary {
    pub id: i64,
    pub remark: Option<String>,
    pub port: i64,
}

/// Which inbounds an operation looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundScope {
    /// Every inbound
    #[default]
    All,
    /// A single inbound by id
    Inbound(i64),
}

impl InboundScope {
    /// Scope from an optional inbound id
    pub fn from_id(id: Option<i64>) -> Self {
        id.map_or(InboundScope::All, InboundScope::Inbound)
    }

    /// Whether the inbound with `id` is in scope
    pub fn includes(&self, id: i64) -> bool {
        match self {
            InboundScope::All => true,
            InboundScope::Inbound(scoped) => *scoped == id,
        }
    }
}

/// One row of the `client_traffics` ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounters {
    pub down: i64,
    pub up: i64,
    pub all_time: i64,
}

impl TrafficCounters {
    /// Counters for a first observation: `all_time` starts at `down + up`
    pub fn fresh(down: i64, up: i64) -> Self {
        Self {
            down,
            up,
            all_time: down.saturating_add(up),
        }
    }

    /// Apply a new instantaneous reading while keeping cumulative usage
    ///
    /// `all_time` moves by the change in `up + down` and never drops
    /// below zero, so a counter reset does not erase history.
    pub fn advance(&self, down: i64, up: i64) -> Self {
        Self {
            down,
            up,
            all_time: carried_all_time(self.all_time, self.up, self.down, up, down),
        }
    }
}

/// Delta-preserving running total
///
/// `max(prior_all_time + (up - prior_up) + (down - prior_down), 0)`
pub fn carried_all_time(prior_all_time: i64, prior_up: i64, prior_down: i64, up: i64, down: i64) -> i64 {
    let delta = (i128::from(up) - i128::from(prior_up)) + (i128::from(down) - i128::from(prior_down));
    let total = i128::from(prior_all_time) + delta;
    total.clamp(0, i128::from(i64::MAX)) as i64
}

/// Ledger row keyed by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEntry {
    pub email: String,
    #[serde(flatten)]
    pub counters: TrafficCounters,
}

impl TrafficEntry {
    pub fn new(email: impl Into<String>, counters: TrafficCounters) -> Self {
        Self {
            email: email.into(),
            counters,
        }
    }
}
