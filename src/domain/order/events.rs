use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Status Change Record - one row of the transition audit trail
// ============================================================================

/// Immutable record of a single successful transition.
///
/// `sequence` is assigned by storage when the entry is appended and is
/// 1-based per order; entries built in memory carry 0 until then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sequence: i64,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub actor: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        order_id: Uuid,
        from_status: OrderStatus,
        to_status: OrderStatus,
        actor: impl Into<String>,
        note: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            sequence: 0,
            from_status,
            to_status,
            actor: actor.into(),
            note,
            recorded_at,
        }
    }

    /// One-line description, e.g. `Status changed from Pending confirmation to Confirmed; note: ok`.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Status changed from {} to {}",
            self.from_status.label(),
            self.to_status.label()
        );
        if let Some(note) = &self.note {
            text.push_str("; note: ");
            text.push_str(note);
        }
        text
    }
}
