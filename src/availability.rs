//! # Availability Module
//!
//! Answers "do I have enough of this?" for recipe ingredients by summing every
//! inventory record of the same ingredient, converted into the unit the recipe
//! asks for. Records whose unit cannot be converted are reported instead of
//! being counted at face value, so a recipe never passes on a guess.

use log::debug;

use crate::inventory_model::InventoryItem;
use crate::item_matcher::normalize_name;
use crate::unit_taxonomy::{normalize_unit, Conversion, UnitTable};

const TOLERANCE: f64 = 1e-9;

/// Stock of one required ingredient
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    /// Enough in stock; `available` is in the required unit
    Sufficient { available: f64 },
    /// Some in stock, not enough
    Insufficient { available: f64, missing: f64 },
    /// No record with that name
    Missing,
    /// Records exist but none can be expressed in the required unit
    Incomparable { units: Vec<String> },
}

impl Availability {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, Availability::Sufficient { .. })
    }
}

/// Check one requirement against the inventory
pub fn check(units: &UnitTable, required: &InventoryItem, inventory: &[InventoryItem]) -> Availability {
    let wanted = normalize_name(&required.name);
    let required_unit = normalize_unit(&required.unit);

    let mut found = false;
    let mut available = 0.0;
    let mut comparable = false;
    let mut incomparable_units = Vec::new();

    for record in inventory.iter().filter(|r| normalize_name(&r.name) == wanted) {
        found = true;
        let quantity = record.display_quantity();
        match units.try_convert(quantity, &record.unit, &required.unit) {
            Conversion::Converted(q) => {
                available += q;
                comparable = true;
            }
            Conversion::Identity(q) if normalize_unit(&record.unit) == required_unit => {
                available += q;
                comparable = true;
            }
            // Count units with different labels, or units from different groups
            Conversion::Identity(_) | Conversion::Incompatible => {
                incomparable_units.push(record.unit.clone());
            }
        }
    }

    if !found {
        return Availability::Missing;
    }
    if !comparable {
        debug!(
            "'{}' is stocked only in units not comparable with '{}': {:?}",
            required.name, required.unit, incomparable_units
        );
        return Availability::Incomparable {
            units: incomparable_units,
        };
    }
    if available + TOLERANCE >= required.quantity {
        Availability::Sufficient { available }
    } else {
        Availability::Insufficient {
            available,
            missing: required.quantity - available,
        }
    }
}

/// Check a whole ingredient list, keeping its order
pub fn check_all(
    units: &UnitTable,
    required: &[InventoryItem],
    inventory: &[InventoryItem],
) -> Vec<(InventoryItem, Availability)> {
    required
        .iter()
        .map(|item| (item.clone(), check(units, item, inventory)))
        .collect()
}
