//! # Pantry
//!
//! Keeps a pantry inventory consistent as items arrive one at a time or in
//! batches: the same ingredient is recognized across spelling and unit
//! differences, quantities are converted between units of the same kind, and
//! the user decides when merging is ambiguous.
//!
//! Records are stored in Postgres or in memory, and duplicate-heavy batches
//! can be merged by an OpenAI-compatible model with a fail-open fallback.

pub mod availability;
pub mod bulk_combine;
pub mod circuit_breaker;
pub mod cli;
pub mod combine;
pub mod config;
pub mod errors;
pub mod inventory_model;
pub mod item_matcher;
pub mod llm_client;
pub mod localization;
pub mod merge_policy;
pub mod pantry_service;
pub mod pg_store;
pub mod prompt;
pub mod quick_add;
pub mod store;
pub mod unit_taxonomy;
