use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Request to move one or more orders to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOrderStatus {
    pub target: OrderStatus,
    pub actor: String,
    pub note: Option<String>,
}

impl TransitionOrderStatus {
    pub fn new(target: OrderStatus, actor: impl Into<String>) -> Self {
        Self {
            target,
            actor: actor.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.actor.trim().is_empty() {
            return Err(OrderError::Validation("actor must not be empty".into()));
        }
        Ok(())
    }

    /// Note with surrounding whitespace removed; blank notes become `None`.
    pub fn normalized_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}
