//! # Pantry Configuration Module
//!
//! Configuration for the pantry service: where records live, how the AI combine
//! collaborator is reached, and how hard we try before falling back.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::errors::PantryError;

pub const DEFAULT_OWNER_ID: &str = "local";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Recovery configuration for the AI combine collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    /// Retry attempts after the first failed call
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for one AI call in seconds
    pub operation_timeout_secs: u64,
    /// Consecutive failures before the AI path is skipped
    pub circuit_breaker_threshold: u32,
    /// Time before the AI path is tried again, in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 3,
            circuit_breaker_reset_secs: 120, // 2 minutes
        }
    }
}

/// Settings for the OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PantryConfig {
    /// Postgres URL; in-memory store when absent
    pub database_url: Option<String>,
    /// Owner scope of stored records
    pub owner_id: String,
    /// AI combine settings; naive combine only when absent
    pub ai: Option<AiConfig>,
    /// Prompt language
    pub language: String,
    pub recovery: RecoveryConfig,
}

impl Default for PantryConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            owner_id: DEFAULT_OWNER_ID.to_string(),
            ai: None,
            language: DEFAULT_LANGUAGE.to_string(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl PantryConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, PantryError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Read configuration from a variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, PantryError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = RecoveryConfig::default();
        let recovery = RecoveryConfig {
            max_retries: parse_or("PANTRY_AI_MAX_RETRIES", get("PANTRY_AI_MAX_RETRIES"), defaults.max_retries)?,
            operation_timeout_secs: parse_or(
                "PANTRY_AI_TIMEOUT_SECS",
                get("PANTRY_AI_TIMEOUT_SECS"),
                defaults.operation_timeout_secs,
            )?,
            ..defaults
        };
        if recovery.operation_timeout_secs == 0 {
            return Err(PantryError::Configuration(
                "PANTRY_AI_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let ai = get("OPENAI_API_KEY").map(|api_key| AiConfig {
            api_key,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let language = get("PANTRY_LANGUAGE")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Self {
            database_url: get("DATABASE_URL"),
            owner_id: get("PANTRY_USER_ID").unwrap_or_else(|| DEFAULT_OWNER_ID.to_string()),
            ai,
            language,
            recovery,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, PantryError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| PantryError::Configuration(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
