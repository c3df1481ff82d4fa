//! # User Prompt Module
//!
//! The modal choices shown while reconciling. Each prompt has exactly two
//! options and a dismiss path, reported as `None`:
//!
//! - unit conflict: `Keep Separate` / `Convert & Combine`, dismiss means no action
//! - batch duplicates: `Keep Separate` / `Combine All`, dismiss means keep separate

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::bulk_combine::BatchSummary;
use crate::inventory_model::{BatchDecision, MergeDecision};
use crate::merge_policy::UnitConflict;

/// Source of user decisions
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask how to add an item whose unit differs from the existing record
    async fn resolve_unit_conflict(&self, conflict: &UnitConflict) -> Option<MergeDecision>;

    /// Ask once what to do with a batch that contains duplicates
    async fn choose_batch_action(&self, summary: &BatchSummary) -> Option<BatchDecision>;
}

/// Prompt answering from a fixed script, for tests and non-interactive runs
///
/// Answers are consumed in order; an exhausted script dismisses.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    merge_answers: Mutex<VecDeque<Option<MergeDecision>>>,
    batch_answers: Mutex<VecDeque<Option<BatchDecision>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_answer(self, answer: Option<MergeDecision>) -> Self {
        if let Ok(mut answers) = self.merge_answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    pub fn batch_answer(self, answer: Option<BatchDecision>) -> Self {
        if let Ok(mut answers) = self.batch_answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    /// Names of the prompts shown so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn record(&self, prompt: String) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt);
        }
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn resolve_unit_conflict(&self, conflict: &UnitConflict) -> Option<MergeDecision> {
        self.record(format!("unit-conflict:{}", conflict.existing.name));
        self.merge_answers.lock().ok()?.pop_front().flatten()
    }

    async fn choose_batch_action(&self, summary: &BatchSummary) -> Option<BatchDecision> {
        self.record(format!("batch:{}", summary.duplicates.len()));
        self.batch_answers.lock().ok()?.pop_front().flatten()
    }
}
