//! Deletion cascade
//!
//! Removes clients from every inbound's `clients` array and drops their
//! ledger rows, atomically.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use super::{SubscriptionEngine, failed};
use crate::directory::decode_settings;
use crate::error::{Error, Result};
use crate::model::{InboundScope, NO_EMAIL, client_identity};
use crate::traits::StoreTransaction;

/// Result of [`SubscriptionEngine::delete_clients`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    /// Embedded client entries removed across all inbounds
    pub removed: usize,
    /// Inbounds whose settings were rewritten
    pub inbounds_rewritten: usize,
    /// Ledger rows deleted
    pub ledger_rows_deleted: u64,
}

impl SubscriptionEngine {
    /// Delete every client whose resolved identity is in `emails`
    ///
    /// A client present in several inbounds is removed from all of them.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty set, an empty email or the
    ///   `<no-email>` placeholder
    /// - [`Error::Operation`] if a statement fails (nothing is written)
    pub async fn delete_clients<I, S>(&self, emails: I) -> Result<DeletionOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let emails: BTreeSet<String> = emails.into_iter().map(Into::into).collect();
        if emails.is_empty() {
            return Err(Error::invalid_input("no clients given for deletion"));
        }
        if emails.iter().any(String::is_empty) {
            return Err(Error::invalid_input("email cannot be empty"));
        }
        if emails.contains(NO_EMAIL) {
            return Err(Error::invalid_input(format!(
                "{} is not a client identity",
                NO_EMAIL
            )));
        }

        let target = emails.iter().cloned().collect::<Vec<_>>().join(",");

        let mut txn = self
            .store
            .begin()
            .await
            .map_err(failed("delete_clients", &target))?;
        let outcome = cascade(txn.as_mut(), &emails)
            .await
            .map_err(failed("delete_clients", &target))?;
        txn.commit().await.map_err(failed("delete_clients", &target))?;

        info!(
            "Deleted {} clients: {} entries in {} inbounds, {} ledger rows",
            emails.len(),
            outcome.removed,
            outcome.inbounds_rewritten,
            outcome.ledger_rows_deleted
        );
        Ok(outcome)
    }
}

async fn cascade(txn: &mut dyn StoreTransaction, emails: &BTreeSet<String>) -> Result<DeletionOutcome> {
    let mut outcome = DeletionOutcome::default();

    for row in txn.fetch_inbounds(InboundScope::All).await? {
        let Some(mut settings) = decode_settings(&row) else {
            continue;
        };

        let removed = settings.retain_clients(|client| {
            client_identity(client).is_none_or(|identity| !emails.contains(&identity))
        });
        if removed > 0 {
            txn.update_settings(row.id, &settings.to_json()?).await?;
            debug!("Removed {} clients from inbound {}", removed, row.id);
            outcome.removed += removed;
            outcome.inbounds_rewritten += 1;
        }
    }

    for email in emails {
        outcome.ledger_rows_deleted += txn.delete_traffic(email).await?;
    }

    Ok(outcome)
}
