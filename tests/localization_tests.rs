//! # Localization Tests
//!
//! Message lookup for every supported language and the texts the terminal
//! front-end builds from them.

use pantry::bulk_combine::{BatchSummary, DuplicatePair};
use pantry::cli::{describe_availability, describe_batch, describe_error, render_batch};
use pantry::availability::Availability;
use pantry::combine::COMBINE_NOT_CONFIGURED;
use pantry::errors::PantryError;
use pantry::inventory_model::{FormIssue, InventoryItem};
use pantry::localization::LocalizationManager;
use pantry::pantry_service::{BatchFailure, BatchOutcome};

fn setup_localization(language: &str) -> LocalizationManager {
    LocalizationManager::new(language).expect("Failed to create localization manager")
}

#[test]
fn test_every_language_loads() {
    for language in LocalizationManager::supported_languages() {
        let manager = setup_localization(language);
        assert_eq!(manager.language(), language);
        for key in ["help", "option-keep-separate", "batch-warning", "form-empty-name"] {
            assert!(manager.has_message(key), "{key} missing in {language}");
        }
    }
}

#[test]
fn test_form_issue_keys_exist() {
    let manager = setup_localization("fr");
    for issue in [FormIssue::EmptyName, FormIssue::NonPositiveQuantity, FormIssue::EmptyUnit] {
        assert!(!manager.message(issue.message_key()).starts_with("Missing translation"));
    }
}

#[test]
fn test_batch_prompt_text() {
    let manager = setup_localization("en");
    let summary = BatchSummary {
        batch_size: 3,
        duplicates: vec![DuplicatePair {
            batch_index: 0,
            incoming: InventoryItem::new("milk", 500.0, "ml"),
            existing: InventoryItem::new("Milk", 1.0, "l"),
        }],
    };
    let text = render_batch(&manager, &summary);
    assert!(text.starts_with("1 of 3 items are already in your pantry"));
    assert!(text.contains("500 ml milk (you have 1 l)"));
    assert!(text.ends_with("[1] Keep Separate or [2] Combine All, anything else to cancel:"));
}

#[test]
fn test_batch_outcome_text() {
    let manager = setup_localization("en");
    let outcome = BatchOutcome {
        inserted: vec![InventoryItem::new("Bread", 1.0, "pcs")],
        warning: Some("AI combine temporarily disabled".to_string()),
        failures: vec![BatchFailure {
            item: "Jam".to_string(),
            error: PantryError::Persistence("timeout".to_string()),
        }],
        ..Default::default()
    };
    let text = describe_batch(&manager, &outcome);
    assert!(text.contains("Added 1 pcs Bread"));
    assert!(text.contains("Smart combine is unavailable"));
    assert!(text.contains("Could not save Jam: Persistence error: timeout. Please try again."));
    assert!(text.ends_with("1 added, 0 updated"));
}

#[test]
fn test_unconfigured_combine_text() {
    for language in LocalizationManager::supported_languages() {
        let manager = setup_localization(language);
        let outcome = BatchOutcome {
            warning: Some(COMBINE_NOT_CONFIGURED.to_string()),
            ..Default::default()
        };
        let text = describe_batch(&manager, &outcome);
        assert!(text.contains(&manager.message("batch-warning-not-configured")));
        assert!(!text.contains(COMBINE_NOT_CONFIGURED));
    }
}

#[test]
fn test_error_and_availability_text() {
    let manager = setup_localization("en");
    assert_eq!(
        describe_error(&manager, &PantryError::NotFound("7".to_string())),
        "That item no longer exists"
    );
    assert_eq!(
        describe_error(&manager, &PantryError::Validation("cannot take 1 g from l".to_string())),
        "Validation error: cannot take 1 g from l"
    );

    let required = InventoryItem::new("Milk", 1.0, "l");
    assert_eq!(
        describe_availability(
            &manager,
            &required,
            &Availability::Insufficient {
                available: 0.25,
                missing: 0.75
            }
        ),
        "1 l Milk: 0.75 l missing (0.25 l available)"
    );
    assert_eq!(
        describe_availability(
            &manager,
            &required,
            &Availability::Incomparable {
                units: vec!["g".to_string()]
            }
        ),
        "Milk: stocked as g, which cannot be compared"
    );
}
