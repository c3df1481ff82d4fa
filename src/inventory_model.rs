//! # Inventory Data Model
//!
//! This module defines the records kept in a user's pantry and the transient
//! decisions that drive reconciliation when new items arrive.
//!
//! ## Core Concepts
//!
//! - **InventoryItem**: an ingredient with a quantity and a free-text unit
//! - **ItemPatch**: the partial field set sent to the store on update
//! - **MergeDecision / BatchDecision**: the user's answer to a duplicate prompt
//!
//! ## Usage
//!
//! ```rust
//! use pantry::inventory_model::InventoryItem;
//!
//! let sugar = InventoryItem::new("Sugar", 500.0, "g");
//! assert!(sugar.validate().is_ok());
//! assert_eq!(sugar.to_string(), "500 g Sugar");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pantry record
///
/// `id` is assigned by the store on creation and is `None` for items that
/// have not been persisted yet (manual entry, transcription, AI output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Store-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Free-text ingredient name (e.g., "Sugar", " milk ")
    pub name: String,

    /// Non-negative amount
    pub quantity: f64,

    /// Free-text unit, known to the unit table or not (e.g., "kg", "jar", "handful")
    pub unit: String,

    /// Display hint only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update sent to the store; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub icon: Option<String>,
}

/// Reasons an add form is not ready to submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormIssue {
    EmptyName,
    NonPositiveQuantity,
    EmptyUnit,
}

/// Answer to the single-item unit conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeDecision {
    /// Store the new item as its own record
    KeepSeparate,
    /// Convert the new quantity into the existing unit and add it
    ConvertAndCombine,
}

/// Answer to the batch duplicate prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchDecision {
    /// Insert every new item independently
    KeepSeparateAll,
    /// Hand the whole inventory and batch to the AI combine collaborator
    CombineAllViaAi,
}

impl InventoryItem {
    /// Create an unpersisted item
    pub fn new(name: &str, quantity: f64, unit: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            icon: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Attach a store identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a display icon
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    /// Whether the store has assigned an identifier
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Check the add-form rules: non-empty name and unit, positive quantity
    pub fn validate(&self) -> Result<(), FormIssue> {
        if self.name.trim().is_empty() {
            return Err(FormIssue::EmptyName);
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(FormIssue::NonPositiveQuantity);
        }
        if self.unit.trim().is_empty() {
            return Err(FormIssue::EmptyUnit);
        }
        Ok(())
    }

    /// Copy without store-specific fields, with trimmed name and unit
    pub fn cleaned(&self) -> Self {
        Self {
            id: None,
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            icon: self.icon.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Apply a patch locally, mirroring what the store does on update
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(icon) = &patch.icon {
            self.icon = Some(icon.clone());
        }
    }

    /// Quantity for display, never negative
    pub fn display_quantity(&self) -> f64 {
        self.quantity.max(0.0)
    }
}

impl ItemPatch {
    /// Patch that replaces only the quantity
    pub fn quantity(quantity: f64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    /// Patch that replaces quantity and unit
    pub fn quantity_and_unit(quantity: f64, unit: &str) -> Self {
        Self {
            quantity: Some(quantity),
            unit: Some(unit.to_string()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.unit.is_none() && self.icon.is_none()
    }
}

impl FormIssue {
    /// Localization key for the issue
    pub fn message_key(&self) -> &'static str {
        match self {
            FormIssue::EmptyName => "form-empty-name",
            FormIssue::NonPositiveQuantity => "form-bad-quantity",
            FormIssue::EmptyUnit => "form-empty-unit",
        }
    }
}

/// Format a quantity without trailing zeros, rounded to three decimals
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < 1e15 {
        return format!("{}", quantity as i64);
    }
    let rounded = format!("{:.3}", quantity);
    rounded.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(icon) = &self.icon {
            write!(f, "{} ", icon)?;
        }
        write!(
            f,
            "{} {} {}",
            format_quantity(self.display_quantity()),
            self.unit,
            self.name
        )
    }
}
