//! # Pantry Service Module
//!
//! The orchestration boundary between the user, the reconciliation rules and
//! the collaborators. It keeps the local copy of the inventory and changes it
//! only after the store has accepted the change, so a failed call never leaves
//! the local state ahead of what is persisted.
//!
//! Collaborator errors stop here: persistence failures come back as
//! [`PantryError`]s the caller shows as retryable notices, and AI combine
//! failures become a warning on an otherwise successful [`BatchOutcome`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::availability::{self, Availability};
use crate::bulk_combine::{self, BatchPlanBuilder, BatchSummary};
use crate::combine::CombineStrategy;
use crate::errors::PantryError;
use crate::inventory_model::{BatchDecision, FormIssue, InventoryItem, ItemPatch, MergeDecision};
use crate::merge_policy::{plan_add, MergePlan, UnitConflict};
use crate::prompt::UserPrompt;
use crate::store::InventoryStore;
use crate::unit_taxonomy::{normalize_unit, Conversion, UnitTable};

/// Result of adding one item
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// Stored as a new record
    Inserted(InventoryItem),
    /// Merged into an existing record, shown with its new total
    Combined(InventoryItem),
    /// The user dismissed the unit conflict prompt
    Dismissed,
    /// The add form is not complete; nothing was sent to the store
    Incomplete(FormIssue),
}

/// An item of a batch that could not be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub item: String,
    pub error: PantryError,
}

/// Result of adding a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub inserted: Vec<InventoryItem>,
    pub updated: Vec<InventoryItem>,
    /// Whether the batch-level choice was shown
    pub prompted: bool,
    pub decision: Option<BatchDecision>,
    /// Soft warning when the combine strategy fell back
    pub warning: Option<String>,
    pub failures: Vec<BatchFailure>,
    /// Items rejected by form validation
    pub skipped: Vec<(InventoryItem, FormIssue)>,
}

/// Pantry of one user
pub struct PantryService<S> {
    store: S,
    units: Arc<UnitTable>,
    strategy: Box<dyn CombineStrategy>,
    items: Vec<InventoryItem>,
}

impl<S: InventoryStore> PantryService<S> {
    pub fn new(store: S, units: Arc<UnitTable>, strategy: Box<dyn CombineStrategy>) -> Self {
        Self {
            store,
            units,
            strategy,
            items: Vec::new(),
        }
    }

    /// Replace the local state with the store's records
    pub async fn load(&mut self) -> Result<usize, PantryError> {
        self.items = self.store.list_all().await?;
        info!(count = self.items.len(), "Inventory loaded");
        Ok(self.items.len())
    }

    /// Local records, in store order
    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&InventoryItem> {
        self.items.iter().find(|item| item.id.as_deref() == Some(id))
    }

    pub fn units(&self) -> &UnitTable {
        &self.units
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn position(&self, id: &str) -> Result<usize, PantryError> {
        self.items
            .iter()
            .position(|item| item.id.as_deref() == Some(id))
            .ok_or_else(|| PantryError::NotFound(id.to_string()))
    }

    fn replace_local(&mut self, stored: InventoryItem) {
        match stored
            .id
            .as_deref()
            .and_then(|id| self.items.iter().position(|item| item.id.as_deref() == Some(id)))
        {
            Some(index) => self.items[index] = stored,
            None => self.items.push(stored),
        }
    }

    /// Add one item, asking the user when units differ but are convertible
    pub async fn add_item(
        &mut self,
        item: &InventoryItem,
        prompt: &dyn UserPrompt,
    ) -> Result<AddOutcome, PantryError> {
        if let Err(issue) = item.validate() {
            debug!(?issue, "Add form incomplete");
            return Ok(AddOutcome::Incomplete(issue));
        }
        let incoming = item.cleaned();

        let plan = match plan_add(&self.units, &incoming, &self.items) {
            MergePlan::AwaitingUserChoice(conflict) => {
                match prompt.resolve_unit_conflict(&conflict).await {
                    Some(decision) => {
                        info!(item = %incoming.name, ?decision, "Unit conflict resolved");
                        conflict.resolve(decision)
                    }
                    None => {
                        info!(item = %incoming.name, "Unit conflict dismissed");
                        return Ok(AddOutcome::Dismissed);
                    }
                }
            }
            plan => plan,
        };

        match plan {
            MergePlan::Insert(new_item) => {
                let stored = self.store.create(&new_item).await.map_err(|e| {
                    warn!(item = %new_item.name, error = %e, "Insert failed");
                    e
                })?;
                info!(item = %stored.name, id = ?stored.id, "Item inserted");
                self.items.push(stored.clone());
                Ok(AddOutcome::Inserted(stored))
            }
            MergePlan::Combine {
                existing_index,
                quantity,
            } => {
                let existing = &self.items[existing_index];
                let id = existing
                    .id
                    .clone()
                    .ok_or_else(|| PantryError::NotFound(existing.name.clone()))?;
                let stored = self
                    .store
                    .update(&id, &ItemPatch::quantity(quantity))
                    .await
                    .map_err(|e| {
                        warn!(id = %id, error = %e, "Combine failed");
                        e
                    })?;
                info!(item = %stored.name, quantity, "Item combined");
                self.items[existing_index] = stored.clone();
                Ok(AddOutcome::Combined(stored))
            }
            MergePlan::AwaitingUserChoice(_) => Ok(AddOutcome::Dismissed),
        }
    }

    /// Add a batch with a single decision for all duplicates
    ///
    /// Items are persisted one by one, updates first; a failing item is
    /// reported in the outcome and the rest of the batch continues.
    pub async fn add_batch(&mut self, batch: &[InventoryItem], prompt: &dyn UserPrompt) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let mut valid = Vec::with_capacity(batch.len());
        for item in batch {
            match item.validate() {
                Ok(()) => valid.push(item.cleaned()),
                Err(issue) => outcome.skipped.push((item.clone(), issue)),
            }
        }
        if valid.is_empty() {
            return outcome;
        }

        let plan = {
            let builder = BatchPlanBuilder::new(&self.units, &self.items).items(&valid);
            if builder.needs_decision() {
                let summary = builder.summary();
                outcome.prompted = true;
                let decision = prompt
                    .choose_batch_action(&summary)
                    .await
                    .unwrap_or(BatchDecision::KeepSeparateAll);
                info!(duplicates = summary.duplicates.len(), ?decision, "Batch decision taken");
                outcome.decision = Some(decision);
                builder.decision(decision).build()
            } else {
                builder.build()
            }
        };

        let combined = bulk_combine::execute(self.strategy.as_ref(), plan, &self.items).await;
        outcome.warning = combined.warning;

        for update in combined.items_to_update {
            let patch = ItemPatch::quantity_and_unit(update.quantity, &update.unit);
            match self.store.update(&update.id, &patch).await {
                Ok(stored) => {
                    self.replace_local(stored.clone());
                    outcome.updated.push(stored);
                }
                Err(error) => {
                    warn!(id = %update.id, error = %error, "Batch update failed");
                    outcome.failures.push(BatchFailure {
                        item: update.name,
                        error,
                    });
                }
            }
        }

        for item in combined.items_to_add {
            match self.store.create(&item).await {
                Ok(stored) => {
                    self.items.push(stored.clone());
                    outcome.inserted.push(stored);
                }
                Err(error) => {
                    warn!(item = %item.name, error = %error, "Batch insert failed");
                    outcome.failures.push(BatchFailure {
                        item: item.name,
                        error,
                    });
                }
            }
        }

        info!(
            inserted = outcome.inserted.len(),
            updated = outcome.updated.len(),
            failed = outcome.failures.len(),
            strategy = combined.strategy,
            "Batch added"
        );
        outcome
    }

    /// Delete a record
    pub async fn remove_item(&mut self, id: &str) -> Result<InventoryItem, PantryError> {
        let index = self.position(id)?;
        self.store.delete(id).await?;
        let removed = self.items.remove(index);
        info!(item = %removed.name, id, "Item removed");
        Ok(removed)
    }

    /// Subtract an amount given in any convertible unit, stopping at zero
    pub async fn consume(&mut self, id: &str, quantity: f64, unit: &str) -> Result<InventoryItem, PantryError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(PantryError::Validation(format!("invalid quantity {quantity}")));
        }
        let index = self.position(id)?;
        let current = &self.items[index];

        let used = match self.units.try_convert(quantity, unit, &current.unit) {
            Conversion::Converted(q) => q,
            Conversion::Identity(q) if normalize_unit(unit) == normalize_unit(&current.unit) => q,
            _ => {
                return Err(PantryError::Validation(format!(
                    "cannot take {quantity} {unit} from {}",
                    current.unit
                )))
            }
        };
        let remaining = (current.quantity - used).max(0.0);

        let stored = self.store.update(id, &ItemPatch::quantity(remaining)).await?;
        info!(item = %stored.name, used, remaining, "Item consumed");
        self.items[index] = stored.clone();
        Ok(stored)
    }

    /// Whether the pantry covers a required amount
    pub fn check_availability(&self, required: &InventoryItem) -> Availability {
        availability::check(&self.units, required, &self.items)
    }

    /// Apply a merge decision without prompting, used by front-ends that ask up front
    pub async fn add_item_with(
        &mut self,
        item: &InventoryItem,
        decision: Option<MergeDecision>,
    ) -> Result<AddOutcome, PantryError> {
        self.add_item(item, &FixedAnswer(decision)).await
    }
}

struct FixedAnswer(Option<MergeDecision>);

#[async_trait]
impl UserPrompt for FixedAnswer {
    async fn resolve_unit_conflict(&self, _conflict: &UnitConflict) -> Option<MergeDecision> {
        self.0
    }

    async fn choose_batch_action(&self, _summary: &BatchSummary) -> Option<BatchDecision> {
        None
    }
}
