//! # Bulk Combine Module
//!
//! Batch additions (a transcribed shopping list, a pasted list) are checked
//! for duplicates once, against the inventory as it was before the batch:
//!
//! 1. No duplicates: every item is inserted, nobody is asked anything
//! 2. Duplicates: one choice is made for the whole batch, either keep every
//!    item separate or hand the inventory and the batch to a [`CombineStrategy`]
//!
//! [`BatchPlanBuilder`] applies the batch-level decision to every item by
//! default. [`BatchPlanBuilder::resolve_item`] overrides it for a single item,
//! for callers that want to ask per duplicate.
//!
//! Whatever the strategy does, the result is a [`CombinePlan`]. A failing
//! strategy degrades to inserting everything separately with a warning.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::combine::{CombinePlan, CombineRequest, CombineStrategy, NaiveSeparateInsert, COMBINE_NOT_CONFIGURED};
use crate::inventory_model::{BatchDecision, InventoryItem};
use crate::item_matcher::{find_duplicates, Duplicate};
use crate::unit_taxonomy::UnitTable;

/// An incoming item next to the record it duplicates
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub batch_index: usize,
    pub incoming: InventoryItem,
    pub existing: InventoryItem,
}

/// What the user is shown before the batch-level choice
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub batch_size: usize,
    pub duplicates: Vec<DuplicatePair>,
}

/// Per-item override of the batch decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemResolution {
    KeepSeparate,
    Combine,
}

/// Items split by how they will be persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    /// Inserted as independent records
    pub separate: Vec<InventoryItem>,
    /// Handed to the combine strategy
    pub to_combine: Vec<InventoryItem>,
}

/// Builds a [`BatchPlan`] from a batch and the inventory snapshot
#[derive(Debug, Clone)]
pub struct BatchPlanBuilder<'a> {
    units: &'a UnitTable,
    existing: &'a [InventoryItem],
    items: Vec<InventoryItem>,
    decision: Option<BatchDecision>,
    overrides: BTreeMap<usize, ItemResolution>,
}

impl<'a> BatchPlanBuilder<'a> {
    pub fn new(units: &'a UnitTable, existing: &'a [InventoryItem]) -> Self {
        Self {
            units,
            existing,
            items: Vec::new(),
            decision: None,
            overrides: BTreeMap::new(),
        }
    }

    /// Add one incoming item, stripped of store fields
    pub fn item(mut self, item: &InventoryItem) -> Self {
        self.items.push(item.cleaned());
        self
    }

    pub fn items(mut self, items: &[InventoryItem]) -> Self {
        self.items.extend(items.iter().map(InventoryItem::cleaned));
        self
    }

    /// Batch-level decision applied to every item without an override
    pub fn decision(mut self, decision: BatchDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Override the batch decision for the item at `batch_index`
    pub fn resolve_item(mut self, batch_index: usize, resolution: ItemResolution) -> Self {
        self.overrides.insert(batch_index, resolution);
        self
    }

    /// Duplicates against the snapshot, computed before anything is merged
    pub fn duplicates(&self) -> Vec<Duplicate> {
        find_duplicates(self.units, &self.items, self.existing)
    }

    /// Whether a decision is needed before building
    pub fn needs_decision(&self) -> bool {
        !self.duplicates().is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_size: self.items.len(),
            duplicates: self
                .duplicates()
                .into_iter()
                .map(|d| DuplicatePair {
                    batch_index: d.batch_index,
                    incoming: self.items[d.batch_index].clone(),
                    existing: self.existing[d.existing_index].clone(),
                })
                .collect(),
        }
    }

    /// Split the batch
    ///
    /// Without duplicates every item is separate. With duplicates and no
    /// decision, items are kept separate as well.
    pub fn build(self) -> BatchPlan {
        if !self.needs_decision() {
            return BatchPlan {
                separate: self.items,
                to_combine: Vec::new(),
            };
        }

        let default = match self.decision.unwrap_or(BatchDecision::KeepSeparateAll) {
            BatchDecision::KeepSeparateAll => ItemResolution::KeepSeparate,
            BatchDecision::CombineAllViaAi => ItemResolution::Combine,
        };

        let mut plan = BatchPlan::default();
        for (index, item) in self.items.into_iter().enumerate() {
            match self.overrides.get(&index).copied().unwrap_or(default) {
                ItemResolution::KeepSeparate => plan.separate.push(item),
                ItemResolution::Combine => plan.to_combine.push(item),
            }
        }
        plan
    }
}

/// Turn a batch plan into a combine plan using `strategy`
///
/// Never fails: if the strategy errors, every item is inserted separately and
/// the error becomes the plan's warning. A strategy that can only insert
/// separately also leaves a warning.
pub async fn execute(
    strategy: &dyn CombineStrategy,
    plan: BatchPlan,
    existing: &[InventoryItem],
) -> CombinePlan {
    let BatchPlan {
        separate,
        to_combine,
    } = plan;

    if to_combine.is_empty() {
        debug!(count = separate.len(), "Batch inserted without combining");
        return CombinePlan {
            items_to_update: Vec::new(),
            items_to_add: separate,
            strategy: "separate",
            warning: None,
        };
    }

    let request = CombineRequest::new(existing, &to_combine);
    let mut combined = match strategy.combine(&request).await {
        Ok(combined) => combined,
        Err(e) => {
            warn!(strategy = strategy.name(), error = %e, "Combine failed, inserting batch separately");
            CombinePlan {
                items_to_update: Vec::new(),
                items_to_add: request.new_items,
                strategy: "separate",
                warning: Some(e.to_string()),
            }
        }
    };
    if combined.strategy == NaiveSeparateInsert.name() && combined.warning.is_none() {
        warn!("Combine requested without an AI strategy, inserting batch separately");
        combined.warning = Some(COMBINE_NOT_CONFIGURED.to_string());
    }

    info!(
        strategy = combined.strategy,
        updates = combined.items_to_update.len(),
        additions = combined.items_to_add.len() + separate.len(),
        "Batch combine planned"
    );
    combined.items_to_add.extend(separate);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::PlannedUpdate;
    use crate::errors::PantryError;
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl CombineStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn combine(&self, _request: &CombineRequest) -> Result<CombinePlan, PantryError> {
            Err(PantryError::AiCombine("unreachable".to_string()))
        }
    }

    struct MergeMilk;

    #[async_trait]
    impl CombineStrategy for MergeMilk {
        fn name(&self) -> &'static str {
            "merge-milk"
        }

        async fn combine(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
            Ok(CombinePlan {
                items_to_update: vec![PlannedUpdate {
                    id: "m1".to_string(),
                    name: "Milk".to_string(),
                    quantity: 1.5,
                    unit: "l".to_string(),
                }],
                items_to_add: request
                    .new_items
                    .iter()
                    .filter(|i| i.name.to_lowercase() != "milk")
                    .cloned()
                    .collect(),
                strategy: self.name(),
                warning: None,
            })
        }
    }

    fn pantry() -> Vec<InventoryItem> {
        vec![InventoryItem::new("Milk", 1.0, "l").with_id("m1")]
    }

    fn batch() -> Vec<InventoryItem> {
        vec![
            InventoryItem::new("milk", 500.0, "ml"),
            InventoryItem::new("Bread", 1.0, "pcs"),
            InventoryItem::new("Jam", 1.0, "jar"),
        ]
    }

    #[test]
    fn test_summary_lists_duplicates() {
        let units = UnitTable::standard();
        let existing = pantry();
        let builder = BatchPlanBuilder::new(&units, &existing).items(&batch());
        assert!(builder.needs_decision());
        let summary = builder.summary();
        assert_eq!(summary.batch_size, 3);
        assert_eq!(summary.duplicates.len(), 1);
        assert_eq!(summary.duplicates[0].existing.name, "Milk");
        assert_eq!(summary.duplicates[0].incoming.quantity, 500.0);
    }

    #[test]
    fn test_no_duplicates_needs_no_decision() {
        let units = UnitTable::standard();
        let existing = pantry();
        let builder = BatchPlanBuilder::new(&units, &existing)
            .item(&InventoryItem::new("Rice", 1.0, "kg"))
            .decision(BatchDecision::CombineAllViaAi);
        assert!(!builder.needs_decision());
        let plan = builder.build();
        assert_eq!(plan.separate.len(), 1);
        assert!(plan.to_combine.is_empty());
    }

    #[test]
    fn test_batch_decision_and_overrides() {
        let units = UnitTable::standard();
        let existing = pantry();

        let all = BatchPlanBuilder::new(&units, &existing)
            .items(&batch())
            .decision(BatchDecision::CombineAllViaAi)
            .build();
        assert_eq!(all.to_combine.len(), 3);

        let separate = BatchPlanBuilder::new(&units, &existing).items(&batch()).build();
        assert_eq!(separate.separate.len(), 3);

        let mixed = BatchPlanBuilder::new(&units, &existing)
            .items(&batch())
            .decision(BatchDecision::CombineAllViaAi)
            .resolve_item(2, ItemResolution::KeepSeparate)
            .build();
        assert_eq!(mixed.to_combine.len(), 2);
        assert_eq!(mixed.separate[0].name, "Jam");
    }

    #[tokio::test]
    async fn test_execute_separate_plan_skips_strategy() {
        let plan = BatchPlan {
            separate: batch(),
            to_combine: Vec::new(),
        };
        let result = execute(&Failing, plan, &pantry()).await;
        assert_eq!(result.items_to_add.len(), 3);
        assert_eq!(result.warning, None);
    }

    #[tokio::test]
    async fn test_execute_fails_open() {
        let plan = BatchPlan {
            separate: Vec::new(),
            to_combine: batch(),
        };
        let result = execute(&Failing, plan, &pantry()).await;
        assert!(result.items_to_update.is_empty());
        assert_eq!(result.items_to_add.len(), 3);
        assert!(result.warning.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_execute_appends_separate_items() {
        let units = UnitTable::standard();
        let existing = pantry();
        let plan = BatchPlanBuilder::new(&units, &existing)
            .items(&batch())
            .decision(BatchDecision::CombineAllViaAi)
            .resolve_item(2, ItemResolution::KeepSeparate)
            .build();

        let result = execute(&MergeMilk, plan, &existing).await;
        assert_eq!(result.items_to_update[0].quantity, 1.5);
        let names: Vec<&str> = result.items_to_add.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Bread", "Jam"]);

        let naive = execute(
            &NaiveSeparateInsert,
            BatchPlan {
                separate: Vec::new(),
                to_combine: batch(),
            },
            &existing,
        )
        .await;
        assert_eq!(naive.items_to_add.len(), 3);
        assert_eq!(naive.warning.as_deref(), Some(COMBINE_NOT_CONFIGURED));
    }
}
