//! # Merge Policy Module
//!
//! Decides what adding one item to the inventory means:
//!
//! - **No match**: insert the item as a new record
//! - **Match with the same unit**: add the quantities under the existing record
//! - **Match with a different but convertible unit**: wait for the user to pick
//!   between keeping the records separate and converting into the existing unit
//!
//! The policy only plans. Persisting the plan, and updating local state once
//! the store has accepted it, belongs to [`crate::pantry_service`].

use crate::inventory_model::{InventoryItem, MergeDecision};
use crate::item_matcher::find_match;
use crate::unit_taxonomy::{normalize_unit, UnitTable};

/// What to do with an incoming item
#[derive(Debug, Clone, PartialEq)]
pub enum MergePlan {
    /// Persist the item as a new record
    Insert(InventoryItem),
    /// Persist `quantity` as the new total of the existing record
    Combine {
        existing_index: usize,
        quantity: f64,
    },
    /// A decision from the user is needed before anything is persisted
    AwaitingUserChoice(UnitConflict),
}

/// Same ingredient, different units: what the user is shown
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConflict {
    pub existing_index: usize,
    pub existing: InventoryItem,
    pub incoming: InventoryItem,
    /// Incoming quantity expressed in the existing record's unit
    pub converted_quantity: f64,
}

impl UnitConflict {
    /// Existing quantity plus the converted incoming quantity
    pub fn combined_quantity(&self) -> f64 {
        self.existing.quantity + self.converted_quantity
    }

    /// Turn the user's answer into a terminal plan
    pub fn resolve(self, decision: MergeDecision) -> MergePlan {
        match decision {
            MergeDecision::KeepSeparate => MergePlan::Insert(self.incoming),
            MergeDecision::ConvertAndCombine => MergePlan::Combine {
                existing_index: self.existing_index,
                quantity: self.combined_quantity(),
            },
        }
    }
}

impl MergePlan {
    /// Whether the plan still needs the user
    pub fn needs_user_choice(&self) -> bool {
        matches!(self, MergePlan::AwaitingUserChoice(_))
    }
}

/// Plan the addition of `incoming` against the current inventory
pub fn plan_add(units: &UnitTable, incoming: &InventoryItem, existing: &[InventoryItem]) -> MergePlan {
    let Some(existing_index) = find_match(units, incoming, existing) else {
        return MergePlan::Insert(incoming.clone());
    };
    let current = &existing[existing_index];

    if normalize_unit(&current.unit) == normalize_unit(&incoming.unit) {
        return MergePlan::Combine {
            existing_index,
            quantity: current.quantity + incoming.quantity,
        };
    }

    MergePlan::AwaitingUserChoice(UnitConflict {
        existing_index,
        existing: current.clone(),
        incoming: incoming.clone(),
        converted_quantity: units.convert(incoming.quantity, &incoming.unit, &current.unit),
    })
}
