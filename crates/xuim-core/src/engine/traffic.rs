// # Traffic Reconciliation
//
// Keeps the `client_traffics` ledger and the embedded client copies in
// step.
//
// ## Cumulative Usage
//
// Both copies carry `all_time` forward by the change in `up + down`
// rather than resetting it, clamped at zero. A ledger row seen for the
// first time starts at `down + up`.
//
// ## Embedded Direction Swap
//
// The panel's embedded counters are written with the directions crossed:
// the new download figure lands in the client's `up` and the new upload
// figure in its `down`. The ledger keeps them straight. Consumers of the
// embedded copy rely on this layout, so it is kept as is.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{SubscriptionEngine, failed};
use crate::directory::decode_settings;
use crate::error::{Error, Result};
use crate::model::client::counter;
use crate::model::{
    InboundScope, NO_EMAIL, TrafficCounters, TrafficEntry, carried_all_time, identity_matches,
};
use crate::traits::StoreTransaction;

/// Result of [`SubscriptionEngine::record_traffic`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficUpdate {
    /// Ledger row as written
    pub ledger: TrafficEntry,
    /// Whether the ledger row was created by this call
    pub ledger_created: bool,
    /// Inbounds whose settings were rewritten
    pub inbounds_rewritten: usize,
    /// Embedded client copies updated
    pub clients_updated: usize,
}

impl SubscriptionEngine {
    /// Record a new traffic reading for `email`
    ///
    /// Upserts the ledger row, then updates every embedded client whose
    /// resolved identity is `email`, in one transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty email, the `<no-email>`
    ///   placeholder or negative byte counts
    /// - [`Error::Operation`] if a statement fails (nothing is written)
    pub async fn record_traffic(&self, email: &str, down: i64, up: i64) -> Result<TrafficUpdate> {
        if email.is_empty() {
            return Err(Error::invalid_input("email cannot be empty"));
        }
        if email == NO_EMAIL {
            return Err(Error::invalid_input(format!(
                "{} is not a client identity",
                NO_EMAIL
            )));
        }
        if down < 0 || up < 0 {
            return Err(Error::invalid_input(format!(
                "byte counts cannot be negative. Got: down={}, up={}",
                down, up
            )));
        }

        let mut txn = self
            .store
            .begin()
            .await
            .map_err(failed("record_traffic", email))?;
        let update = reconcile(txn.as_mut(), email, down, up)
            .await
            .map_err(failed("record_traffic", email))?;
        txn.commit().await.map_err(failed("record_traffic", email))?;

        info!(
            "Recorded traffic for {}: all_time={} ({} ledger row, {} clients in {} inbounds)",
            email,
            update.ledger.counters.all_time,
            if update.ledger_created { "new" } else { "existing" },
            update.clients_updated,
            update.inbounds_rewritten
        );
        Ok(update)
    }
}

async fn reconcile(
    txn: &mut dyn StoreTransaction,
    email: &str,
    down: i64,
    up: i64,
) -> Result<TrafficUpdate> {
    let (ledger, ledger_created) = match txn.get_traffic(email).await? {
        Some(prior) => (TrafficEntry::new(email, prior.counters.advance(down, up)), false),
        None => (TrafficEntry::new(email, TrafficCounters::fresh(down, up)), true),
    };

    if ledger_created {
        txn.insert_traffic(&ledger).await?;
    } else {
        txn.update_traffic(&ledger).await?;
    }

    let mut inbounds_rewritten = 0;
    let mut clients_updated = 0;

    for row in txn.fetch_inbounds(InboundScope::All).await? {
        let Some(mut settings) = decode_settings(&row) else {
            continue;
        };

        let touched = settings.clients_mut().map_or(0, |clients| {
            clients
                .iter_mut()
                .filter(|client| identity_matches(client, email))
                .filter_map(|client| write_embedded(client, down, up))
                .count()
        });

        if touched > 0 {
            txn.update_settings(row.id, &settings.to_json()?).await?;
            debug!("Updated {} copies of {} in inbound {}", touched, email, row.id);
            inbounds_rewritten += 1;
            clients_updated += touched;
        }
    }

    Ok(TrafficUpdate {
        ledger,
        ledger_created,
        inbounds_rewritten,
        clients_updated,
    })
}

/// Overwrite one embedded client's counters; `None` if it is not an object
fn write_embedded(client: &mut Value, down: i64, up: i64) -> Option<()> {
    let all_time = carried_all_time(
        counter(client, "all_time"),
        counter(client, "up"),
        counter(client, "down"),
        up,
        down,
    );

    let fields = client.as_object_mut()?;
    // Directions are crossed in the embedded copy
    fields.insert("up".to_string(), Value::from(down));
    fields.insert("down".to_string(), Value::from(up));
    fields.insert("all_time".to_string(), Value::from(all_time));
    Some(())
}
