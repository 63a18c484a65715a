// # Embedded Client Records
//
// Accessors over one element of `settings.clients` and the derived
// per-client state.
//
// ## Identity
//
// Every engine resolves a client's identity through [`client_identity`]:
// `email`, else `emailAddress`, else `id`. Empty strings and nulls fall
// through to the next field; numeric ids are rendered as decimal strings.
//
// A client with none of these has no identity. Listings show it as
// `<no-email>`, but that placeholder never matches anything: mutations by
// identity leave such clients alone.
//
// ## Expiry Encoding
//
// `expiryTime` is stored in milliseconds:
// - `0`        → unlimited
// - `> 0`      → absolute expiry instant
// - `< 0`      → not started; the magnitude is a countdown applied on first use

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder identity for clients with no usable identifier
pub const NO_EMAIL: &str = "<no-email>";

/// Seconds in one day
pub const SECS_PER_DAY: i64 = 86_400;

/// Identity fields in resolution order
const IDENTITY_FIELDS: [&str; 3] = ["email", "emailAddress", "id"];

/// A client's identity, or `None` if it has no usable identifier
pub fn client_identity(client: &Value) -> Option<String> {
    IDENTITY_FIELDS
        .iter()
        .find_map(|field| identity_value(client.get(field)))
}

/// Display identity; falls back to [`NO_EMAIL`]
pub fn resolve_identity(client: &Value) -> String {
    client_identity(client).unwrap_or_else(|| NO_EMAIL.to_string())
}

/// Whether `client` is the one identified by `email`
///
/// Clients without an identity match nothing, the placeholder included.
pub fn identity_matches(client: &Value, email: &str) -> bool {
    client_identity(client).is_some_and(|identity| identity == email)
}

fn identity_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Raw `expiryTime` in milliseconds; absent, null or non-numeric reads as 0
pub fn expiry_time_ms(client: &Value) -> i64 {
    client.get("expiryTime").map_or(0, as_i64_lossy)
}

/// `enable` flag; absent or null reads as `true`
pub fn is_enabled(client: &Value) -> bool {
    client
        .get("enable")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// Byte counter (`up`, `down`, `all_time`); absent or null reads as 0
pub fn counter(client: &Value, key: &str) -> i64 {
    client.get(key).map_or(0, as_i64_lossy)
}

fn as_i64_lossy(value: &Value) -> i64 {
    if let Some(n) = value.as_i64() {
        n
    } else if value.as_u64().is_some() {
        i64::MAX
    } else if let Some(f) = value.as_f64() {
        f as i64
    } else {
        0
    }
}

/// Whole seconds of a millisecond timestamp (floor division)
pub fn ms_to_secs(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

/// Case-insensitive substring filter; `None` and empty filters match everything
pub fn name_matches(identity: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(needle) if !needle.is_empty() => identity
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        _ => true,
    }
}

/// Expiry state of a client at a reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExpiryState {
    /// `expiryTime == 0`
    Unlimited,
    /// `expiryTime < 0`; activation happens on first connection
    NotStarted {
        /// Countdown applied on activation (milliseconds)
        countdown_ms: i64,
    },
    /// Expiry is in the future (or exactly now)
    Active {
        expires_at: i64,
    },
    /// Expiry passed
    Expired {
        expires_at: i64,
        days_expired: i64,
    },
}

impl ExpiryState {
    /// Classify a raw `expiryTime` against `now` (seconds since epoch)
    pub fn classify(expiry_time_ms: i64, now: i64) -> Self {
        if expiry_time_ms == 0 {
            return ExpiryState::Unlimited;
        }
        if expiry_time_ms < 0 {
            return ExpiryState::NotStarted {
                countdown_ms: expiry_time_ms.saturating_neg(),
            };
        }

        let expires_at = ms_to_secs(expiry_time_ms);
        if expires_at < now {
            ExpiryState::Expired {
                expires_at,
                days_expired: (now - expires_at) / SECS_PER_DAY,
            }
        } else {
            ExpiryState::Active { expires_at }
        }
    }
}

/// A client flattened out of an inbound's settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Containing inbound
    pub inbound_id: i64,
    /// Containing inbound's port
    pub port: i64,
    /// Resolved identity
    pub email: String,
    /// Raw `expiryTime` (milliseconds)
    pub expiry_time_ms: i64,
    /// `enable` flag
    pub enabled: bool,
    pub up: i64,
    pub down: i64,
    pub all_time: i64,
}

impl ClientRecord {
    /// Build a record from one element of `settings.clients`
    pub fn from_value(inbound_id: i64, port: i64, client: &Value) -> Self {
        Self {
            inbound_id,
            port,
            email: resolve_identity(client),
            expiry_time_ms: expiry_time_ms(client),
            enabled: is_enabled(client),
            up: counter(client, "up"),
            down: counter(client, "down"),
            all_time: counter(client, "all_time"),
        }
    }

    /// Expiry state at `now`
    pub fn expiry_state(&self, now: i64) -> ExpiryState {
        ExpiryState::classify(self.expiry_time_ms, now)
    }

    /// Inverse of the `enable` overlay
    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_fallback_chain() {
        assert_eq!(resolve_identity(&json!({"email": "a@x", "id": "u1"})), "a@x");
        assert_eq!(resolve_identity(&json!({"email": "", "emailAddress": "b@x"})), "b@x");
        assert_eq!(resolve_identity(&json!({"email": null, "id": "uuid-1"})), "uuid-1");
        assert_eq!(resolve_identity(&json!({"id": 42})), "42");
        assert_eq!(resolve_identity(&json!({"flow": "xtls"})), NO_EMAIL);
    }

    #[test]
    fn placeholder_is_not_an_identity() {
        let anonymous = json!({"flow": "xtls", "expiryTime": 0});
        assert_eq!(client_identity(&anonymous), None);
        assert!(!identity_matches(&anonymous, NO_EMAIL));
        assert!(!identity_matches(&anonymous, ""));
        assert!(identity_matches(&json!({"id": 42}), "42"));
    }

    #[test]
    fn field_defaults() {
        let client = json!({"email": "a@x", "expiryTime": null});
        assert_eq!(expiry_time_ms(&client), 0);
        assert!(is_enabled(&client));
        assert_eq!(counter(&client, "all_time"), 0);

        let disabled = json!({"enable": false, "expiryTime": 1.5e12, "up": 7});
        assert!(!is_enabled(&disabled));
        assert_eq!(expiry_time_ms(&disabled), 1_500_000_000_000);
        assert_eq!(counter(&disabled, "up"), 7);
    }

    #[test]
    fn seconds_use_floor_division() {
        assert_eq!(ms_to_secs(1_999), 1);
        assert_eq!(ms_to_secs(-1), -1);
        assert_eq!(ms_to_secs(-1_000), -1);
    }

    #[test]
    fn classify_three_way_sentinel() {
        assert_eq!(ExpiryState::classify(0, 100), ExpiryState::Unlimited);
        assert_eq!(
            ExpiryState::classify(-86_400_000, 100),
            ExpiryState::NotStarted {
                countdown_ms: 86_400_000
            }
        );
        assert_eq!(
            ExpiryState::classify(1_000_000, 2_000_000),
            ExpiryState::Expired {
                expires_at: 1_000,
                days_expired: 23
            }
        );
        assert_eq!(
            ExpiryState::classify(5_000_000, 5_000),
            ExpiryState::Active { expires_at: 5_000 }
        );
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        assert!(name_matches("Alice@Example", Some("alice")));
        assert!(name_matches("bob", None));
        assert!(name_matches("bob", Some("")));
        assert!(!name_matches("bob", Some("alice")));
    }
}
