//! # Combine Strategies
//!
//! A batch of new items is merged into the inventory by a [`CombineStrategy`],
//! which turns the current inventory and the batch into a [`CombinePlan`]: the
//! records to insert and the existing records whose quantities are replaced.
//!
//! - [`NaiveSeparateInsert`] inserts every new item and never fails
//! - [`AiAssistedCombine`] asks a language model to merge the lists
//! - [`WithFallback`] retries one strategy and falls back to another, so a
//!   failing model never blocks the user's batch
//!
//! The AI collaborator receives
//! `{ existingItems: [{originalId, name, quantity, unit}], newItems: [...] }`
//! and must answer `{ itemsToAdd: [...], itemsToUpdate: [...] }`, where every
//! update points back at an existing record through `originalId` or its name.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::errors::PantryError;
use crate::inventory_model::InventoryItem;
use crate::item_matcher::normalize_name;
use crate::llm_client::CompletionClient;

/// Inputs handed to a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct CombineRequest {
    /// Persisted inventory snapshot
    pub existing_items: Vec<InventoryItem>,
    /// Incoming batch, without store fields
    pub new_items: Vec<InventoryItem>,
}

impl CombineRequest {
    pub fn new(existing_items: &[InventoryItem], new_items: &[InventoryItem]) -> Self {
        Self {
            existing_items: existing_items.to_vec(),
            new_items: new_items.iter().map(InventoryItem::cleaned).collect(),
        }
    }
}

/// Replacement of an existing record's totals
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    /// Id of the existing record
    pub id: String,
    pub name: String,
    /// New total, not a delta
    pub quantity: f64,
    pub unit: String,
}

/// What a strategy wants done, updates first
#[derive(Debug, Clone, PartialEq)]
pub struct CombinePlan {
    pub items_to_update: Vec<PlannedUpdate>,
    pub items_to_add: Vec<InventoryItem>,
    /// Strategy that produced the plan
    pub strategy: &'static str,
    /// Set when the plan comes from a fallback after a failure
    pub warning: Option<String>,
}

/// Produces a combine plan for a batch
#[async_trait]
pub trait CombineStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn combine(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError>;
}

/// Warning set when a combine was asked for but only separate inserts are available
pub const COMBINE_NOT_CONFIGURED: &str = "AI combine is not configured";

/// Inserts every new item as its own record
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveSeparateInsert;

#[async_trait]
impl CombineStrategy for NaiveSeparateInsert {
    fn name(&self) -> &'static str {
        "separate"
    }

    async fn combine(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
        Ok(CombinePlan {
            items_to_update: Vec::new(),
            items_to_add: request.new_items.clone(),
            strategy: self.name(),
            warning: None,
        })
    }
}

const COMBINE_SYSTEM_PROMPT: &str = r#"You merge pantry inventories.
You receive JSON with "existingItems" (each has "originalId", "name", "quantity", "unit") and "newItems" (each has "name", "quantity", "unit").
For every new item that is the same ingredient as an existing item, add its quantity to the existing item, converting units when needed, and output the existing item in "itemsToUpdate" with its "originalId" and the NEW TOTAL quantity.
Every other new item goes to "itemsToAdd" unchanged.
Never drop an item. Never output existing items that did not change.
Respond with ONLY this JSON object:
{"itemsToAdd": [{"name": "...", "quantity": 0, "unit": "..."}], "itemsToUpdate": [{"originalId": "...", "name": "...", "quantity": 0, "unit": "..."}]}"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    existing_items: Vec<WireExisting<'a>>,
    new_items: Vec<WireNew<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireExisting<'a> {
    original_id: &'a str,
    name: &'a str,
    quantity: f64,
    unit: &'a str,
}

#[derive(Debug, Serialize)]
struct WireNew<'a> {
    name: &'a str,
    quantity: f64,
    unit: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    items_to_add: Option<Vec<WireItem>>,
    items_to_update: Option<Vec<WireItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    #[serde(default)]
    original_id: Option<String>,
    name: String,
    quantity: f64,
    unit: String,
    #[serde(default)]
    icon: Option<String>,
}

/// Merges a batch by asking a language model
#[derive(Debug, Clone)]
pub struct AiAssistedCombine<C> {
    client: C,
}

impl<C: CompletionClient> AiAssistedCombine<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

fn render_request(request: &CombineRequest) -> Result<String, PantryError> {
    let wire = WireRequest {
        existing_items: request
            .existing_items
            .iter()
            .filter_map(|item| {
                item.id.as_deref().map(|id| WireExisting {
                    original_id: id,
                    name: &item.name,
                    quantity: item.quantity,
                    unit: &item.unit,
                })
            })
            .collect(),
        new_items: request
            .new_items
            .iter()
            .map(|item| WireNew {
                name: &item.name,
                quantity: item.quantity,
                unit: &item.unit,
            })
            .collect(),
    };
    serde_json::to_string(&wire)
        .map_err(|e| PantryError::Validation(format!("Failed to encode combine request: {e}")))
}

fn check_item(item: &WireItem) -> Result<(), PantryError> {
    if item.name.trim().is_empty() {
        return Err(PantryError::MalformedResponse("item without a name".to_string()));
    }
    if !item.quantity.is_finite() || item.quantity < 0.0 {
        return Err(PantryError::MalformedResponse(format!(
            "invalid quantity {} for '{}'",
            item.quantity, item.name
        )));
    }
    if item.unit.trim().is_empty() {
        return Err(PantryError::MalformedResponse(format!(
            "'{}' has no unit",
            item.name
        )));
    }
    Ok(())
}

/// Find the existing record an update refers to: by id first, then by name
fn resolve_target<'a>(update: &WireItem, existing: &'a [InventoryItem]) -> Option<&'a InventoryItem> {
    let by_id = update.original_id.as_deref().and_then(|original_id| {
        existing
            .iter()
            .find(|item| item.id.as_deref() == Some(original_id))
    });
    by_id.or_else(|| {
        let wanted = normalize_name(&update.name);
        existing
            .iter()
            .find(|item| item.id.is_some() && normalize_name(&item.name) == wanted)
    })
}

/// Parse and validate the model's answer against the request
///
/// Nothing is applied unless the whole answer is usable.
pub fn parse_combine_response(
    raw: &str,
    request: &CombineRequest,
    strategy: &'static str,
) -> Result<CombinePlan, PantryError> {
    let response: WireResponse = serde_json::from_str(raw.trim())?;
    let (Some(to_add), Some(to_update)) = (response.items_to_add, response.items_to_update) else {
        return Err(PantryError::MalformedResponse(
            "itemsToAdd and itemsToUpdate are both required".to_string(),
        ));
    };

    let mut items_to_update = Vec::with_capacity(to_update.len());
    for update in &to_update {
        check_item(update)?;
        let target = resolve_target(update, &request.existing_items).ok_or_else(|| {
            PantryError::MalformedResponse(format!(
                "update for '{}' does not match any existing item",
                update.name
            ))
        })?;
        let Some(id) = target.id.clone() else {
            continue;
        };
        items_to_update.push(PlannedUpdate {
            id,
            name: target.name.clone(),
            quantity: update.quantity,
            unit: update.unit.trim().to_string(),
        });
    }

    let mut items_to_add = Vec::with_capacity(to_add.len());
    for add in to_add {
        check_item(&add)?;
        let mut item = InventoryItem::new(add.name.trim(), add.quantity, add.unit.trim());
        item.icon = add.icon;
        items_to_add.push(item);
    }

    Ok(CombinePlan {
        items_to_update,
        items_to_add,
        strategy,
        warning: None,
    })
}

#[async_trait]
impl<C: CompletionClient> CombineStrategy for AiAssistedCombine<C> {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn combine(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
        let user_prompt = render_request(request)?;
        debug!(
            existing = request.existing_items.len(),
            incoming = request.new_items.len(),
            "Requesting AI combine"
        );
        let raw = self.client.complete_json(COMBINE_SYSTEM_PROMPT, &user_prompt).await?;
        let plan = parse_combine_response(&raw, request, self.name())?;
        info!(
            updates = plan.items_to_update.len(),
            additions = plan.items_to_add.len(),
            "AI combine plan accepted"
        );
        Ok(plan)
    }
}

/// Exponential backoff with random jitter, capped at `max_retry_delay_ms`
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16));
    let capped = exponential.min(config.max_retry_delay_ms);
    let jitter = if capped > 0 {
        rand::thread_rng().gen_range(0..=capped / 4)
    } else {
        0
    };
    Duration::from_millis(capped.saturating_add(jitter).min(config.max_retry_delay_ms))
}

/// Retries `primary`, then answers with `fallback`'s plan and a warning
pub struct WithFallback {
    primary: Box<dyn CombineStrategy>,
    fallback: Box<dyn CombineStrategy>,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl WithFallback {
    pub fn new(
        primary: Box<dyn CombineStrategy>,
        fallback: Box<dyn CombineStrategy>,
        recovery: RecoveryConfig,
    ) -> Self {
        let breaker = CircuitBreaker::new(recovery.clone());
        Self {
            primary,
            fallback,
            recovery,
            breaker,
        }
    }

    /// AI combine over `client`, falling back to separate inserts
    pub fn ai_or_separate<C: CompletionClient + 'static>(client: C, recovery: RecoveryConfig) -> Self {
        Self::new(
            Box::new(AiAssistedCombine::new(client)),
            Box::new(NaiveSeparateInsert),
            recovery,
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn attempt(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
        let timeout = Duration::from_secs(self.recovery.operation_timeout_secs);
        match tokio::time::timeout(timeout, self.primary.combine(request)).await {
            Ok(result) => result,
            Err(_) => Err(PantryError::AiCombine(format!(
                "{} combine timed out after {}s",
                self.primary.name(),
                self.recovery.operation_timeout_secs
            ))),
        }
    }

    async fn run_primary(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
        if self.breaker.is_open() {
            return Err(PantryError::CircuitOpen);
        }

        let mut last_error = PantryError::CircuitOpen;
        for attempt in 0..=self.recovery.max_retries {
            if attempt > 0 {
                let delay = calculate_retry_delay(attempt - 1, &self.recovery);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying combine");
                tokio::time::sleep(delay).await;
            }
            match self.attempt(request).await {
                Ok(plan) => {
                    self.breaker.record_success();
                    return Ok(plan);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    warn!(strategy = self.primary.name(), attempt, error = %e, "Combine attempt failed");
                    last_error = e;
                    if self.breaker.is_open() {
                        break;
                    }
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl CombineStrategy for WithFallback {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn combine(&self, request: &CombineRequest) -> Result<CombinePlan, PantryError> {
        match self.run_primary(request).await {
            Ok(plan) => Ok(plan),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Falling back"
                );
                let mut plan = self.fallback.combine(request).await?;
                plan.warning = Some(e.to_string());
                Ok(plan)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CannedClient {
        answers: Arc<Mutex<VecDeque<Result<String, PantryError>>>>,
        calls: Arc<AtomicUsize>,
        last_prompt: Arc<Mutex<String>>,
    }

    impl CannedClient {
        fn answering(answers: Vec<Result<String, PantryError>>) -> Self {
            Self {
                answers: Arc::new(Mutex::new(answers.into())),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete_json(&self, _system: &str, user: &str) -> Result<String, PantryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = user.to_string();
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PantryError::AiCombine("no answer".to_string())))
        }
    }

    fn fast_recovery(max_retries: u32) -> RecoveryConfig {
        RecoveryConfig {
            max_retries,
            base_retry_delay_ms: 0,
            max_retry_delay_ms: 0,
            operation_timeout_secs: 5,
            circuit_breaker_threshold: 10,
            circuit_breaker_reset_secs: 60,
        }
    }

    fn request() -> CombineRequest {
        CombineRequest::new(
            &[
                InventoryItem::new("Milk", 1.0, "l").with_id("m1"),
                InventoryItem::new("Eggs", 6.0, "pcs").with_id("e1"),
            ],
            &[
                InventoryItem::new(" milk ", 500.0, "ml").with_id("ignored"),
                InventoryItem::new("Butter", 250.0, "g"),
            ],
        )
    }

    #[test]
    fn test_request_is_cleaned() {
        let request = request();
        assert_eq!(request.new_items[0].id, None);
        assert_eq!(request.new_items[0].name, "milk");
    }

    #[test]
    fn test_render_request_carries_original_ids() {
        let rendered = render_request(&request()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["existingItems"][0]["originalId"], "m1");
        assert_eq!(value["newItems"][1]["name"], "Butter");
        assert!(value["newItems"][0].get("originalId").is_none());
    }

    #[tokio::test]
    async fn test_naive_inserts_everything() {
        let plan = NaiveSeparateInsert.combine(&request()).await.unwrap();
        assert!(plan.items_to_update.is_empty());
        assert_eq!(plan.items_to_add.len(), 2);
        assert_eq!(plan.strategy, "separate");
        assert_eq!(plan.warning, None);
    }

    #[test]
    fn test_parse_resolves_by_id_then_name() {
        let raw = r#"{
            "itemsToAdd": [{"name": "Butter", "quantity": 250, "unit": "g"}],
            "itemsToUpdate": [
                {"originalId": "m1", "name": "Milk", "quantity": 1.5, "unit": "l"},
                {"name": " EGGS ", "quantity": 12, "unit": "pcs"}
            ]
        }"#;
        let plan = parse_combine_response(raw, &request(), "ai").unwrap();
        assert_eq!(plan.items_to_update.len(), 2);
        assert_eq!(plan.items_to_update[0].id, "m1");
        assert_eq!(plan.items_to_update[0].quantity, 1.5);
        assert_eq!(plan.items_to_update[1].id, "e1");
        assert_eq!(plan.items_to_update[1].name, "Eggs");
        assert_eq!(plan.items_to_add[0].name, "Butter");
    }

    #[test]
    fn test_parse_rejects_malformed_answers() {
        let request = request();
        let cases = [
            "not json",
            r#"{"itemsToAdd": []}"#,
            r#"{"itemsToUpdate": []}"#,
            r#"{"itemsToAdd": [], "itemsToUpdate": [{"name": "Bread", "quantity": 1, "unit": "pcs"}]}"#,
            r#"{"itemsToAdd": [{"name": "", "quantity": 1, "unit": "pcs"}], "itemsToUpdate": []}"#,
            r#"{"itemsToAdd": [{"name": "Jam", "quantity": -1, "unit": "jar"}], "itemsToUpdate": []}"#,
            r#"{"itemsToAdd": [{"name": "Jam", "quantity": 1, "unit": " "}], "itemsToUpdate": []}"#,
        ];
        for raw in cases {
            assert!(
                matches!(
                    parse_combine_response(raw, &request, "ai"),
                    Err(PantryError::MalformedResponse(_))
                ),
                "expected malformed for {raw}"
            );
        }
    }

    #[tokio::test]
    async fn test_ai_combine_uses_client() {
        let client = CannedClient::answering(vec![Ok(
            r#"{"itemsToAdd": [], "itemsToUpdate": [{"originalId": "m1", "name": "Milk", "quantity": 1.5, "unit": "l"}]}"#
                .to_string(),
        )]);
        let strategy = AiAssistedCombine::new(client.clone());
        let plan = strategy.combine(&request()).await.unwrap();
        assert_eq!(plan.strategy, "ai");
        assert_eq!(plan.items_to_update[0].quantity, 1.5);
        assert!(client.last_prompt.lock().unwrap().contains("\"originalId\":\"m1\""));
    }

    #[tokio::test]
    async fn test_fallback_after_retries() {
        let client = CannedClient::answering(vec![
            Err(PantryError::AiCombine("503".to_string())),
            Ok("garbage".to_string()),
        ]);
        let strategy = WithFallback::ai_or_separate(client.clone(), fast_recovery(1));
        let plan = strategy.combine(&request()).await.unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(plan.strategy, "separate");
        assert_eq!(plan.items_to_add.len(), 2);
        assert!(plan.warning.unwrap().contains("Malformed"));
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let client = CannedClient::answering(vec![
            Err(PantryError::AiCombine("timeout".to_string())),
            Ok(r#"{"itemsToAdd": [], "itemsToUpdate": []}"#.to_string()),
        ]);
        let strategy = WithFallback::ai_or_separate(client.clone(), fast_recovery(2));
        let plan = strategy.combine(&request()).await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(plan.strategy, "ai");
        assert_eq!(plan.warning, None);
        assert_eq!(strategy.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_primary() {
        let client = CannedClient::answering(vec![]);
        let recovery = RecoveryConfig {
            circuit_breaker_threshold: 1,
            ..fast_recovery(3)
        };
        let strategy = WithFallback::ai_or_separate(client.clone(), recovery);

        let first = strategy.combine(&request()).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert!(first.warning.is_some());

        let second = strategy.combine(&request()).await.unwrap();
        assert_eq!(client.calls(), 1);
        assert_eq!(second.warning.as_deref(), Some("AI combine temporarily disabled"));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = RecoveryConfig {
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 1000,
            ..Default::default()
        };
        assert!(calculate_retry_delay(0, &config) >= Duration::from_millis(100));
        assert!(calculate_retry_delay(0, &config) <= Duration::from_millis(125));
        assert_eq!(calculate_retry_delay(10, &config), Duration::from_millis(1000));
        assert_eq!(calculate_retry_delay(3, &fast_recovery(0)), Duration::ZERO);
    }
}
