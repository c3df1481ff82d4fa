//! # Item Matcher Module
//!
//! Decides whether an incoming item refers to an ingredient that is already in
//! the inventory: same name once trimmed and lowercased, and units of the same
//! kind according to the [`UnitTable`]. All functions here are pure queries.

use log::{debug, trace};

use crate::inventory_model::InventoryItem;
use crate::unit_taxonomy::UnitTable;

/// Normalize an ingredient name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether two items count as the same ingredient
pub fn is_same_ingredient(units: &UnitTable, existing: &InventoryItem, incoming: &InventoryItem) -> bool {
    normalize_name(&existing.name) == normalize_name(&incoming.name)
        && units.are_convertible(&existing.unit, &incoming.unit)
}

/// Index of the first existing item matching `incoming`, in inventory order
pub fn find_match(
    units: &UnitTable,
    incoming: &InventoryItem,
    existing: &[InventoryItem],
) -> Option<usize> {
    let found = existing
        .iter()
        .position(|candidate| is_same_ingredient(units, candidate, incoming));

    match found {
        Some(index) => debug!(
            "Matched '{}' ({}) to existing item #{} '{}' ({})",
            incoming.name, incoming.unit, index, existing[index].name, existing[index].unit
        ),
        None => trace!("No existing item matches '{}' ({})", incoming.name, incoming.unit),
    }
    found
}

/// A batch item that duplicates something already in the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplicate {
    /// Position in the incoming batch
    pub batch_index: usize,
    /// Position of the first matching record in the inventory snapshot
    pub existing_index: usize,
}

/// Pre-pass over a batch against the original inventory snapshot
///
/// Batch items are never matched against each other, only against `existing`.
pub fn find_duplicates(
    units: &UnitTable,
    batch: &[InventoryItem],
    existing: &[InventoryItem],
) -> Vec<Duplicate> {
    let duplicates: Vec<Duplicate> = batch
        .iter()
        .enumerate()
        .filter_map(|(batch_index, item)| {
            find_match(units, item, existing).map(|existing_index| Duplicate {
                batch_index,
                existing_index,
            })
        })
        .collect();

    debug!(
        "Found {} duplicates in a batch of {} against {} existing items",
        duplicates.len(),
        batch.len(),
        existing.len()
    );
    duplicates
}
