//! # AI Combine Tests
//!
//! Batch additions through `WithFallback` over a scripted completion client:
//! a usable answer is applied, anything else falls back to separate inserts.

use async_trait::async_trait;
use pantry::combine::WithFallback;
use pantry::config::RecoveryConfig;
use pantry::errors::PantryError;
use pantry::inventory_model::{BatchDecision, InventoryItem};
use pantry::llm_client::CompletionClient;
use pantry::pantry_service::PantryService;
use pantry::prompt::ScriptedPrompt;
use pantry::store::{InMemoryStore, InventoryStore};
use pantry::unit_taxonomy::UnitTable;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct ScriptedClient {
    answer: Arc<dyn Fn(&str) -> Result<String, PantryError> + Send + Sync>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    fn new(answer: impl Fn(&str) -> Result<String, PantryError> + Send + Sync + 'static) -> Self {
        Self {
            answer: Arc::new(answer),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<String, PantryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        (self.answer)(user)
    }
}

fn recovery() -> RecoveryConfig {
    RecoveryConfig {
        max_retries: 1,
        base_retry_delay_ms: 0,
        max_retry_delay_ms: 0,
        operation_timeout_secs: 5,
        circuit_breaker_threshold: 5,
        circuit_breaker_reset_secs: 60,
    }
}

async fn service(client: ScriptedClient) -> PantryService<InMemoryStore> {
    let store = InMemoryStore::with_items(vec![
        InventoryItem::new("Milk", 1.0, "l"),
        InventoryItem::new("Eggs", 6.0, "pcs"),
    ]);
    let strategy = WithFallback::ai_or_separate(client, recovery());
    let mut service = PantryService::new(store, UnitTable::standard(), Box::new(strategy));
    service.load().await.unwrap();
    service
}

fn batch() -> Vec<InventoryItem> {
    vec![
        InventoryItem::new("milk", 500.0, "ml"),
        InventoryItem::new("Flour", 1.0, "kg"),
        InventoryItem::new("Butter", 250.0, "g"),
    ]
}

fn combine_all() -> ScriptedPrompt {
    ScriptedPrompt::new().batch_answer(Some(BatchDecision::CombineAllViaAi))
}

#[tokio::test]
async fn test_ai_answer_is_applied() {
    let client = ScriptedClient::new(|_| {
        Ok(r#"{
            "itemsToUpdate": [{"originalId": "item-1", "name": "Milk", "quantity": 1.5, "unit": "l"}],
            "itemsToAdd": [
                {"name": "Flour", "quantity": 1, "unit": "kg"},
                {"name": "Butter", "quantity": 250, "unit": "g"}
            ]
        }"#
        .to_string())
    });
    let mut service = service(client.clone()).await;

    let outcome = service.add_batch(&batch(), &combine_all()).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.warning, None);
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].quantity, 1.5);
    assert_eq!(outcome.inserted.len(), 2);
    assert_eq!(service.items().len(), 4);

    let prompt = client.prompts.lock().unwrap()[0].clone();
    let request: serde_json::Value = serde_json::from_str(&prompt).unwrap();
    assert_eq!(request["existingItems"].as_array().unwrap().len(), 2);
    assert_eq!(request["newItems"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_resolved_by_name_when_id_is_missing() {
    let client = ScriptedClient::new(|_| {
        Ok(r#"{
            "itemsToUpdate": [{"name": "MILK", "quantity": 1500, "unit": "ml"}],
            "itemsToAdd": []
        }"#
        .to_string())
    });
    let mut service = service(client).await;

    let outcome = service.add_batch(&batch()[..1], &combine_all()).await;

    assert_eq!(outcome.updated.len(), 1);
    let milk = &service.items()[0];
    assert_eq!((milk.name.as_str(), milk.quantity, milk.unit.as_str()), ("Milk", 1500.0, "ml"));
}

#[tokio::test]
async fn test_malformed_answer_falls_back_to_separate_records() {
    let client = ScriptedClient::new(|_| Ok(r#"{"itemsToAdd": []}"#.to_string()));
    let mut service = service(client.clone()).await;

    let outcome = service.add_batch(&batch(), &combine_all()).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    assert!(outcome.updated.is_empty());
    assert_eq!(outcome.inserted.len(), 3);
    assert!(outcome.warning.unwrap().contains("itemsToUpdate"));
    assert_eq!(service.store().list_all().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_unknown_original_id_falls_back() {
    let client = ScriptedClient::new(|_| {
        Ok(r#"{
            "itemsToUpdate": [{"originalId": "nope", "name": "Cream", "quantity": 1, "unit": "l"}],
            "itemsToAdd": []
        }"#
        .to_string())
    });
    let mut service = service(client).await;

    let outcome = service.add_batch(&batch(), &combine_all()).await;

    assert!(outcome.updated.is_empty());
    assert_eq!(outcome.inserted.len(), 3);
    assert!(outcome.warning.is_some());
    assert_eq!(service.items()[0].quantity, 1.0);
}

#[tokio::test]
async fn test_transport_error_falls_back() {
    let client = ScriptedClient::new(|_| Err(PantryError::AiCombine("connection refused".to_string())));
    let mut service = service(client).await;

    let outcome = service.add_batch(&batch(), &combine_all()).await;

    assert_eq!(outcome.inserted.len(), 3);
    assert!(outcome.warning.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_keep_separate_never_calls_ai() {
    let client = ScriptedClient::new(|_| Err(PantryError::AiCombine("should not be called".to_string())));
    let mut service = service(client.clone()).await;
    let prompt = ScriptedPrompt::new().batch_answer(Some(BatchDecision::KeepSeparateAll));

    let outcome = service.add_batch(&batch(), &prompt).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.inserted.len(), 3);
    assert_eq!(outcome.warning, None);
}
