//! # Pantry Error Types Module
//!
//! This module defines the error taxonomy shared by the persistence, AI combine
//! and orchestration layers. The pure unit and matching modules never produce
//! these errors.

/// Errors raised by the collaborators behind the pantry service
#[derive(Debug, Clone, PartialEq)]
pub enum PantryError {
    /// Input rejected before reaching a collaborator
    Validation(String),
    /// Create/update/delete/list against the store failed
    Persistence(String),
    /// The referenced record does not exist in the store
    NotFound(String),
    /// The AI combine call failed (transport, status, timeout)
    AiCombine(String),
    /// The AI combine call answered with something we cannot apply
    MalformedResponse(String),
    /// The AI collaborator is temporarily disabled after repeated failures
    CircuitOpen,
    /// Invalid configuration value
    Configuration(String),
}

impl PantryError {
    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PantryError::Persistence(_) | PantryError::AiCombine(_) | PantryError::CircuitOpen
        )
    }
}

impl std::fmt::Display for PantryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PantryError::Validation(msg) => write!(f, "Validation error: {msg}"),
            PantryError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            PantryError::NotFound(id) => write!(f, "Item not found: {id}"),
            PantryError::AiCombine(msg) => write!(f, "AI combine error: {msg}"),
            PantryError::MalformedResponse(msg) => write!(f, "Malformed AI response: {msg}"),
            PantryError::CircuitOpen => write!(f, "AI combine temporarily disabled"),
            PantryError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for PantryError {}

impl From<anyhow::Error> for PantryError {
    fn from(err: anyhow::Error) -> Self {
        PantryError::Persistence(err.to_string())
    }
}

impl From<sqlx::Error> for PantryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PantryError::NotFound("row not found".to_string()),
            other => PantryError::Persistence(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for PantryError {
    fn from(err: reqwest::Error) -> Self {
        PantryError::AiCombine(err.to_string())
    }
}

impl From<serde_json::Error> for PantryError {
    fn from(err: serde_json::Error) -> Self {
        PantryError::MalformedResponse(err.to_string())
    }
}
