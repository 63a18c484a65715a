// # Enablement
//
// Re-enables disabled clients.
//
// ## Locating the Inbound
//
// A target names its inbound by id when known. Without an id the inbound
// is looked up by port, which the panel does not keep unique:
// - `PortPolicy::FirstMatch` takes the lowest id sharing the port
// - `PortPolicy::RequireUnique` skips the target instead
//
// ## Working Set
//
// Inbounds are decoded once into a working map and rewritten at the end,
// so several targets in the same inbound produce a single write and the
// reported count is the number of distinct inbounds modified.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{SubscriptionEngine, failed};
use crate::config::PortPolicy;
use crate::directory::decode_settings;
use crate::error::Result;
use crate::model::client::is_enabled;
use crate::model::{InboundRow, InboundScope, InboundSettings, NO_EMAIL, identity_matches};
use crate::traits::StoreTransaction;

/// Client to re-enable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableTarget {
    /// Preferred locator
    pub inbound_id: Option<i64>,
    /// Fallback locator when `inbound_id` is absent
    pub port: i64,
    pub email: String,
}

impl EnableTarget {
    /// Target located by inbound id
    pub fn in_inbound(inbound_id: i64, port: i64, email: impl Into<String>) -> Self {
        Self {
            inbound_id: Some(inbound_id),
            port,
            email: email.into(),
        }
    }

    /// Target located by port only
    pub fn on_port(port: i64, email: impl Into<String>) -> Self {
        Self {
            inbound_id: None,
            port,
            email: email.into(),
        }
    }
}

/// Why a target was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The target names no client identity (empty or `<no-email>`)
    NoIdentity,
    /// No inbound has the given id
    InboundNotFound,
    /// No inbound listens on the port
    NoInboundOnPort,
    /// Several inbounds share the port and the policy requires one
    AmbiguousPort { candidates: Vec<i64> },
    /// The inbound's settings could not be decoded
    UnreadableSettings,
    /// No disabled client with this identity in the inbound
    NoDisabledClient,
}

/// A target that was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    pub target: EnableTarget,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of [`SubscriptionEngine::enable_clients`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnableOutcome {
    /// Distinct inbounds rewritten
    pub inbounds_modified: usize,
    /// Clients switched to `enable = true`
    pub clients_enabled: usize,
    pub skipped: Vec<SkippedTarget>,
}

/// Decoded inbounds touched by this invocation
#[derive(Default)]
struct WorkingSet {
    inbounds: BTreeMap<i64, Option<InboundSettings>>,
    dirty: BTreeSet<i64>,
}

impl WorkingSet {
    fn load(&mut self, row: &InboundRow) {
        self.inbounds
            .entry(row.id)
            .or_insert_with(|| decode_settings(row));
    }
}

impl SubscriptionEngine {
    /// Set `enable = true` on each target's disabled client
    ///
    /// Targets that cannot be applied are reported in
    /// [`EnableOutcome::skipped`] and do not fail the call.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Operation`] if a statement fails (nothing is written)
    pub async fn enable_clients(&self, targets: &[EnableTarget]) -> Result<EnableOutcome> {
        let target = format!("{} targets", targets.len());

        let mut txn = self
            .store
            .begin()
            .await
            .map_err(failed("enable_clients", &target))?;
        let outcome = enable_all(txn.as_mut(), targets, self.config.port_policy)
            .await
            .map_err(failed("enable_clients", &target))?;
        txn.commit().await.map_err(failed("enable_clients", &target))?;

        info!(
            "Enabled {} clients in {} inbounds ({} skipped)",
            outcome.clients_enabled,
            outcome.inbounds_modified,
            outcome.skipped.len()
        );
        Ok(outcome)
    }
}

async fn enable_all(
    txn: &mut dyn StoreTransaction,
    targets: &[EnableTarget],
    policy: PortPolicy,
) -> Result<EnableOutcome> {
    let mut working = WorkingSet::default();
    let mut outcome = EnableOutcome::default();

    for target in targets {
        if target.email.is_empty() || target.email == NO_EMAIL {
            warn!("Skipping enable target without a client identity on port {}", target.port);
            outcome.skipped.push(SkippedTarget {
                target: target.clone(),
                reason: SkipReason::NoIdentity,
            });
            continue;
        }

        let inbound_id = match locate(txn, &mut working, target, policy).await? {
            Ok(id) => id,
            Err(reason) => {
                outcome.skipped.push(SkippedTarget {
                    target: target.clone(),
                    reason,
                });
                continue;
            }
        };

        let Some(Some(settings)) = working.inbounds.get_mut(&inbound_id) else {
            outcome.skipped.push(SkippedTarget {
                target: target.clone(),
                reason: SkipReason::UnreadableSettings,
            });
            continue;
        };

        let enabled = settings.clients_mut().map_or(0, |clients| {
            clients
                .iter_mut()
                .filter(|client| !is_enabled(client) && identity_matches(client, &target.email))
                .filter_map(|client| {
                    client
                        .as_object_mut()
                        .map(|fields| fields.insert("enable".to_string(), Value::Bool(true)))
                })
                .count()
        });

        if enabled == 0 {
            debug!("No disabled client {} in inbound {}", target.email, inbound_id);
            outcome.skipped.push(SkippedTarget {
                target: target.clone(),
                reason: SkipReason::NoDisabledClient,
            });
            continue;
        }

        debug!("Enabled {} in inbound {}", target.email, inbound_id);
        working.dirty.insert(inbound_id);
        outcome.clients_enabled += enabled;
    }

    for id in &working.dirty {
        if let Some(Some(settings)) = working.inbounds.get(id) {
            txn.update_settings(*id, &settings.to_json()?).await?;
        }
    }
    outcome.inbounds_modified = working.dirty.len();

    Ok(outcome)
}

/// Resolve a target to an inbound id, loading it into the working set
///
/// The outer `Result` carries store errors; the inner one a skip reason.
async fn locate(
    txn: &mut dyn StoreTransaction,
    working: &mut WorkingSet,
    target: &EnableTarget,
    policy: PortPolicy,
) -> Result<std::result::Result<i64, SkipReason>> {
    if let Some(id) = target.inbound_id {
        if working.inbounds.contains_key(&id) {
            return Ok(Ok(id));
        }
        let rows = txn.fetch_inbounds(InboundScope::Inbound(id)).await?;
        return Ok(match rows.first() {
            Some(row) => {
                working.load(row);
                Ok(id)
            }
            None => {
                warn!("Inbound {} not found, skipping {}", id, target.email);
                Err(SkipReason::InboundNotFound)
            }
        });
    }

    let rows = txn.fetch_inbounds_by_port(target.port).await?;
    let chosen = match (rows.as_slice(), policy) {
        ([], _) => {
            warn!("No inbound on port {}, skipping {}", target.port, target.email);
            return Ok(Err(SkipReason::NoInboundOnPort));
        }
        ([row], _) => row,
        (many, PortPolicy::RequireUnique) => {
            let candidates: Vec<i64> = many.iter().map(|row| row.id).collect();
            warn!(
                "Port {} is shared by inbounds {:?}, skipping {}",
                target.port, candidates, target.email
            );
            return Ok(Err(SkipReason::AmbiguousPort { candidates }));
        }
        ([first, ..], PortPolicy::FirstMatch) => {
            warn!(
                "Port {} is shared by {} inbounds, using inbound {}",
                target.port,
                rows.len(),
                first.id
            );
            first
        }
    };

    working.load(chosen);
    Ok(Ok(chosen.id))
}
