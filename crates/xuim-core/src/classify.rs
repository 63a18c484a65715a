// # Status Classifier
//
// Pure functions over directory records. None of them read a clock: the
// reference instant `now` (seconds since epoch) is always passed in.
//
// ## Subsets
//
// - expired:      `expiryTime > 0` and `expiryTime / 1000 < now`
// - not started:  `expiryTime < 0`
// - unlimited:    `expiryTime == 0`
// - inactive:     `enable == false`
//
// The first three partition the directory; inactive is an overlay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::client::name_matches;
use crate::model::{ClientRecord, ExpiryState};

/// Client whose expiry has passed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredClient {
    pub inbound_id: i64,
    pub port: i64,
    pub email: String,
    /// Expiry instant in seconds
    pub expiry_seconds: i64,
    /// Whole days since expiry
    pub days_expired: i64,
    /// Expiry instant as a UTC date, when representable
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Client that has not connected yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotStartedClient {
    pub inbound_id: i64,
    pub port: i64,
    pub email: String,
    /// Raw negative `expiryTime`
    pub expiry_time_ms: i64,
}

/// Location of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRef {
    pub inbound_id: i64,
    pub port: i64,
    pub email: String,
}

impl From<&ClientRecord> for ClientRef {
    fn from(record: &ClientRecord) -> Self {
        Self {
            inbound_id: record.inbound_id,
            port: record.port,
            email: record.email.clone(),
        }
    }
}

/// Clients expired for at least `min_days_expired` whole days
///
/// `min_days_expired == 0` applies no floor. `name` filters on a
/// case-insensitive substring of the resolved identity.
pub fn find_expired(
    records: &[ClientRecord],
    now: i64,
    min_days_expired: u32,
    name: Option<&str>,
) -> Vec<ExpiredClient> {
    records
        .iter()
        .filter_map(|record| match record.expiry_state(now) {
            ExpiryState::Expired {
                expires_at,
                days_expired,
            } => Some((record, expires_at, days_expired)),
            _ => None,
        })
        .filter(|(_, _, days_expired)| *days_expired >= i64::from(min_days_expired))
        .filter(|(record, _, _)| name_matches(&record.email, name))
        .map(|(record, expiry_seconds, days_expired)| ExpiredClient {
            inbound_id: record.inbound_id,
            port: record.port,
            email: record.email.clone(),
            expiry_seconds,
            days_expired,
            expiry_date: DateTime::from_timestamp(expiry_seconds, 0),
        })
        .collect()
}

/// Clients with a pending countdown
pub fn find_not_started(records: &[ClientRecord], name: Option<&str>) -> Vec<NotStartedClient> {
    records
        .iter()
        .filter(|record| record.expiry_time_ms < 0)
        .filter(|record| name_matches(&record.email, name))
        .map(|record| NotStartedClient {
            inbound_id: record.inbound_id,
            port: record.port,
            email: record.email.clone(),
            expiry_time_ms: record.expiry_time_ms,
        })
        .collect()
}

/// Clients without an expiry
pub fn find_unlimited(records: &[ClientRecord]) -> Vec<ClientRef> {
    records
        .iter()
        .filter(|record| record.expiry_time_ms == 0)
        .map(ClientRef::from)
        .collect()
}

/// Disabled clients
pub fn find_inactive(records: &[ClientRecord]) -> Vec<ClientRef> {
    records
        .iter()
        .filter(|record| record.is_disabled())
        .map(ClientRef::from)
        .collect()
}
