//! Client directory reader
//!
//! Flattens every inbound's `settings.clients` array into a uniform list of
//! [`ClientRecord`]s.
//!
//! Rows are decoded one at a time. A row whose settings are not valid JSON,
//! not an object, or whose `clients` field is not an array contributes no
//! clients; the failure is logged at `debug` and the scan continues.

use tracing::debug;

use crate::error::Result;
use crate::model::{ClientRecord, InboundRow, InboundScope, InboundSettings};
use crate::traits::PanelStore;

/// Decode a row's settings, logging and discarding failures
pub fn decode_settings(row: &InboundRow) -> Option<InboundSettings> {
    match InboundSettings::parse(&row.settings) {
        Ok(settings) => Some(settings),
        Err(e) => {
            debug!("Skipping inbound {} (port {}): {}", row.id, row.port, e);
            None
        }
    }
}

/// Flatten rows into client records, in inbound then array order
pub fn flatten(rows: &[InboundRow]) -> Vec<ClientRecord> {
    rows.iter()
        .filter_map(|row| {
            decode_settings(row).map(|settings| settings.records(row.id, row.port).collect::<Vec<_>>())
        })
        .flatten()
        .collect()
}

/// Read every client in `scope`
pub async fn read_clients(store: &dyn PanelStore, scope: InboundScope) -> Result<Vec<ClientRecord>> {
    let rows = store.fetch_inbounds(scope).await?;
    let records = flatten(&rows);
    debug!(
        "Read {} clients from {} inbounds ({} store)",
        records.len(),
        rows.len(),
        store.store_name()
    );
    Ok(records)
}
