//! Validation of raw extraction output into mutation records.
//!
//! The model's tool-call arguments are untrusted: entries can be missing the
//! name, carry the wrong types, or hold negative quantities. Invalid entries
//! are dropped individually so one bad entry never discards the rest of the
//! batch. Order is preserved because mutations within a batch apply
//! sequentially.

use tracing::warn;

use super::item::MutationRecord;

/// Validate a raw items array into an ordered batch of mutations.
pub fn reconcile_mutations(raw_items: &[serde_json::Value]) -> Vec<MutationRecord> {
    let mut records = Vec::with_capacity(raw_items.len());

    for (index, raw) in raw_items.iter().enumerate() {
        let has_name = raw
            .get("item")
            .and_then(|v| v.as_str())
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !has_name {
            warn!("Dropping extracted entry {} without an item name", index);
            continue;
        }

        let record: MutationRecord = match serde_json::from_value(raw.clone()) {
            Ok(r) => r,
            Err(e) => {
                warn!("Dropping malformed extracted entry {}: {}", index, e);
                continue;
            }
        };

        if record.quantity < 0.0 {
            warn!(
                "Dropping extracted entry {} with negative quantity {}",
                index, record.quantity
            );
            continue;
        }

        records.push(record);
    }

    records
}
