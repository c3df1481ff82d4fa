//! # Unit Taxonomy Module
//!
//! Classifies free-text unit strings into volume, weight and count groups and
//! converts quantities between units of the same group through a canonical
//! base unit (milliliters for volume, grams for weight).
//!
//! The lookup structure is an immutable [`UnitTable`] passed to whoever needs
//! it. [`UnitTable::standard`] returns the shared default table; tests and
//! callers with regional units can build their own through [`UnitTableBuilder`].
//!
//! ```rust
//! use pantry::unit_taxonomy::{Conversion, UnitGroup, UnitTable};
//!
//! let units = UnitTable::standard();
//! assert_eq!(units.group_of("KG"), Some(UnitGroup::Weight));
//! assert_eq!(units.convert(500.0, "g", "kg"), 0.5);
//! assert_eq!(units.try_convert(1.0, "ml", "g"), Conversion::Incompatible);
//! ```

use lazy_static::lazy_static;
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::PantryError;

/// Family of units that describe the same kind of amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitGroup {
    /// Convertible through milliliters
    Volume,
    /// Convertible through grams
    Weight,
    /// Nominally related, never numerically converted
    Count,
}

impl UnitGroup {
    /// Base unit all members convert through, if the group converts at all
    pub fn canonical_unit(&self) -> Option<&'static str> {
        match self {
            UnitGroup::Volume => Some("ml"),
            UnitGroup::Weight => Some("g"),
            UnitGroup::Count => None,
        }
    }
}

impl fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitGroup::Volume => write!(f, "volume"),
            UnitGroup::Weight => write!(f, "weight"),
            UnitGroup::Count => write!(f, "count"),
        }
    }
}

/// Result of converting a quantity between two units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Same unit, or count units: the quantity stands as is
    Identity(f64),
    /// Numerically converted through the group's base unit
    Converted(f64),
    /// Different groups or an unknown unit: the quantities cannot be compared
    Incompatible,
}

impl Conversion {
    /// Converted value, `None` when incompatible
    pub fn value(&self) -> Option<f64> {
        match self {
            Conversion::Identity(q) | Conversion::Converted(q) => Some(*q),
            Conversion::Incompatible => None,
        }
    }

    pub fn is_compatible(&self) -> bool {
        !matches!(self, Conversion::Incompatible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UnitEntry {
    group: UnitGroup,
    /// Multiplier to the canonical base unit; `None` for count units
    factor: Option<f64>,
}

/// Immutable unit lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTable {
    units: HashMap<String, UnitEntry>,
}

/// Builder for [`UnitTable`]; errors are collected and reported by `build`
#[derive(Debug, Default)]
pub struct UnitTableBuilder {
    units: HashMap<String, UnitEntry>,
    errors: Vec<String>,
}

lazy_static! {
    static ref STANDARD_TABLE: Arc<UnitTable> = Arc::new(
        UnitTable::builder()
            .volume(&["ml", "milliliter", "milliliters", "millilitre", "millilitres"], 1.0)
            .volume(&["cl", "centiliter", "centiliters"], 10.0)
            .volume(&["dl", "deciliter", "deciliters"], 100.0)
            .volume(&["l", "liter", "liters", "litre", "litres"], 1000.0)
            .volume(&["tsp", "teaspoon", "teaspoons"], 4.92892)
            .volume(&["tbsp", "tablespoon", "tablespoons"], 14.7868)
            .volume(&["fl oz", "fluid ounce", "fluid ounces"], 29.5735)
            .volume(&["cup", "cups"], 236.588)
            .volume(&["pint", "pints"], 473.176)
            .volume(&["quart", "quarts"], 946.353)
            .volume(&["gallon", "gallons"], 3785.41)
            .weight(&["mg", "milligram", "milligrams"], 0.001)
            .weight(&["g", "gram", "grams", "gramme", "grammes"], 1.0)
            .weight(&["kg", "kilogram", "kilograms"], 1000.0)
            .weight(&["oz", "ounce", "ounces"], 28.3495)
            .weight(&["lb", "lbs", "pound", "pounds"], 453.592)
            .count(&[
                "pcs", "pc", "piece", "pieces", "item", "items", "unit", "units", "pack",
                "packs", "package", "packages", "packet", "packets", "can", "cans", "bottle",
                "bottles", "box", "boxes", "bag", "bags", "jar", "jars", "slice", "slices",
                "clove", "cloves", "bunch", "bunches", "dozen",
            ])
            .build()
            .expect("standard unit table should be valid")
    );
}

/// Normalize a unit string for lookup: trimmed, lowercase, single spaces, no trailing period
pub fn normalize_unit(unit: &str) -> String {
    unit.trim()
        .trim_end_matches('.')
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

impl UnitTable {
    /// Start an empty table
    pub fn builder() -> UnitTableBuilder {
        UnitTableBuilder::default()
    }

    /// The shared default table (metric, US customary and common count units)
    pub fn standard() -> Arc<UnitTable> {
        Arc::clone(&STANDARD_TABLE)
    }

    /// Group of a unit, `None` when the unit is not in the table
    pub fn group_of(&self, unit: &str) -> Option<UnitGroup> {
        self.units.get(&normalize_unit(unit)).map(|entry| entry.group)
    }

    /// Whether the table knows this unit
    pub fn is_known(&self, unit: &str) -> bool {
        self.group_of(unit).is_some()
    }

    /// Units compare as the same kind of amount: equal strings, or members of one group
    pub fn are_convertible(&self, unit1: &str, unit2: &str) -> bool {
        let (a, b) = (normalize_unit(unit1), normalize_unit(unit2));
        if a == b {
            return true;
        }
        match (self.units.get(&a), self.units.get(&b)) {
            (Some(x), Some(y)) => x.group == y.group,
            _ => false,
        }
    }

    /// Convert with an explicit result for incompatible units
    pub fn try_convert(&self, quantity: f64, from_unit: &str, to_unit: &str) -> Conversion {
        let (from, to) = (normalize_unit(from_unit), normalize_unit(to_unit));
        if from == to {
            return Conversion::Identity(quantity);
        }

        let (Some(source), Some(target)) = (self.units.get(&from), self.units.get(&to)) else {
            debug!(
                "Precision gap: cannot convert {} '{}' to '{}' (unknown unit)",
                quantity, from_unit, to_unit
            );
            return Conversion::Incompatible;
        };

        if source.group != target.group {
            debug!(
                "Precision gap: cannot convert {} '{}' ({}) to '{}' ({})",
                quantity, from_unit, source.group, to_unit, target.group
            );
            return Conversion::Incompatible;
        }

        match (source.factor, target.factor) {
            (Some(from_factor), Some(to_factor)) => {
                let converted = quantity * from_factor / to_factor;
                trace!("Converted {} {} -> {} {}", quantity, from, converted, to);
                Conversion::Converted(converted)
            }
            _ => Conversion::Identity(quantity),
        }
    }

    /// Convert a quantity, returning it unchanged when the units cannot be converted
    pub fn convert(&self, quantity: f64, from_unit: &str, to_unit: &str) -> f64 {
        self.try_convert(quantity, from_unit, to_unit)
            .value()
            .unwrap_or(quantity)
    }

    /// All known unit names in a group, sorted
    pub fn units_in(&self, group: UnitGroup) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .units
            .iter()
            .filter(|(_, entry)| entry.group == group)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        STANDARD_TABLE.as_ref().clone()
    }
}

impl UnitTableBuilder {
    /// Register volume units with their size in milliliters
    pub fn volume(self, names: &[&str], ml: f64) -> Self {
        self.insert(names, UnitGroup::Volume, Some(ml))
    }

    /// Register weight units with their size in grams
    pub fn weight(self, names: &[&str], grams: f64) -> Self {
        self.insert(names, UnitGroup::Weight, Some(grams))
    }

    /// Register count units (no numeric conversion)
    pub fn count(self, names: &[&str]) -> Self {
        self.insert(names, UnitGroup::Count, None)
    }

    fn insert(mut self, names: &[&str], group: UnitGroup, factor: Option<f64>) -> Self {
        if let Some(f) = factor {
            if !f.is_finite() || f <= 0.0 {
                self.errors
                    .push(format!("factor for {:?} must be positive, got {}", names, f));
                return self;
            }
        }
        for name in names {
            let key = normalize_unit(name);
            if key.is_empty() {
                self.errors.push(format!("empty unit name in {} group", group));
                continue;
            }
            if let Some(existing) = self.units.get(&key) {
                if existing.group != group {
                    self.errors.push(format!(
                        "unit '{}' registered in both {} and {} groups",
                        key, existing.group, group
                    ));
                    continue;
                }
            }
            self.units.insert(key, UnitEntry { group, factor });
        }
        self
    }

    /// Finish the table, rejecting it if any registration was invalid
    pub fn build(self) -> Result<UnitTable, PantryError> {
        if !self.errors.is_empty() {
            return Err(PantryError::Configuration(self.errors.join("; ")));
        }
        Ok(UnitTable { units: self.units })
    }
}
