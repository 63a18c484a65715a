//! Expiry adjustment
//!
//! Shifts the expiry of still-active clients by a signed number of days.
//! Unlimited, not-started and already-expired clients are never touched,
//! and a shortened expiry is clamped so it never lands before `now`.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{SubscriptionEngine, failed};
use crate::directory::decode_settings;
use crate::error::{Error, Result};
use crate::model::client::{expiry_time_ms, ms_to_secs, name_matches};
use crate::model::{InboundScope, NO_EMAIL, SECS_PER_DAY, client_identity};
use crate::traits::StoreTransaction;

/// One client whose expiry moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustedClient {
    pub inbound_id: i64,
    pub email: String,
    pub previous_expiry_ms: i64,
    pub expiry_time_ms: i64,
}

/// Result of [`SubscriptionEngine::adjust_expiry`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryAdjustment {
    pub clients_adjusted: usize,
    pub inbounds_rewritten: usize,
    pub adjusted: Vec<AdjustedClient>,
}

impl SubscriptionEngine {
    /// Add `days` (may be negative) to every active client's expiry
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `days` is zero
    /// - [`Error::Operation`] if a statement fails (nothing is written)
    pub async fn adjust_expiry(
        &self,
        now: i64,
        days: i64,
        scope: InboundScope,
        name: Option<&str>,
    ) -> Result<ExpiryAdjustment> {
        if days == 0 {
            return Err(Error::invalid_input("day offset must be non-zero"));
        }

        let target = match scope {
            InboundScope::All => "all inbounds".to_string(),
            InboundScope::Inbound(id) => format!("inbound {}", id),
        };

        let mut txn = self
            .store
            .begin()
            .await
            .map_err(failed("adjust_expiry", &target))?;
        let outcome = shift_all(txn.as_mut(), now, days, scope, name)
            .await
            .map_err(failed("adjust_expiry", &target))?;
        txn.commit().await.map_err(failed("adjust_expiry", &target))?;

        info!(
            "Shifted expiry by {} days for {} clients in {} inbounds",
            days, outcome.clients_adjusted, outcome.inbounds_rewritten
        );
        Ok(outcome)
    }
}

async fn shift_all(
    txn: &mut dyn StoreTransaction,
    now: i64,
    days: i64,
    scope: InboundScope,
    name: Option<&str>,
) -> Result<ExpiryAdjustment> {
    let mut outcome = ExpiryAdjustment::default();

    for row in txn.fetch_inbounds(scope).await? {
        let Some(mut settings) = decode_settings(&row) else {
            continue;
        };

        let mut adjusted = Vec::new();
        if let Some(clients) = settings.clients_mut() {
            for client in clients.iter_mut() {
                let identity = client_identity(client);
                if !name_matches(identity.as_deref().unwrap_or_default(), name) {
                    continue;
                }
                let email = identity.unwrap_or_else(|| NO_EMAIL.to_string());
                let previous = expiry_time_ms(client);
                let Some(shifted) = shifted_expiry_ms(previous, days, now) else {
                    continue;
                };
                if let Some(fields) = client.as_object_mut() {
                    fields.insert("expiryTime".to_string(), Value::from(shifted));
                    adjusted.push(AdjustedClient {
                        inbound_id: row.id,
                        email,
                        previous_expiry_ms: previous,
                        expiry_time_ms: shifted,
                    });
                }
            }
        }

        if !adjusted.is_empty() {
            txn.update_settings(row.id, &settings.to_json()?).await?;
            debug!("Shifted {} clients in inbound {}", adjusted.len(), row.id);
            outcome.inbounds_rewritten += 1;
            outcome.clients_adjusted += adjusted.len();
            outcome.adjusted.extend(adjusted);
        }
    }

    Ok(outcome)
}

/// New `expiryTime` for an eligible client, `None` otherwise
///
/// Eligible means a positive expiry still in the future. The result is
/// whole seconds, at least `now`, scaled back to milliseconds.
fn shifted_expiry_ms(expiry_ms: i64, days: i64, now: i64) -> Option<i64> {
    if expiry_ms <= 0 {
        return None;
    }
    let expires_at = ms_to_secs(expiry_ms);
    if expires_at <= now {
        return None;
    }

    let shifted = expires_at
        .saturating_add(days.saturating_mul(SECS_PER_DAY))
        .max(now);
    Some(shifted.saturating_mul(1000))
}
