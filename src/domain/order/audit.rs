use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::errors::OrderError;
use super::events::AuditEntry;
use super::transitions::TransitionValidator;
use super::value_objects::{Order, OrderStatus};
use crate::store::OrderStore;

// ============================================================================
// Audit Log Writer
// ============================================================================
//
// Builds, appends and reads the per-order transition trail. Entries are never
// updated or removed. Replaying an order's trail from `pending` through the
// validator must reproduce its current status.
//
// ============================================================================

pub struct AuditLogWriter {
    store: Arc<dyn OrderStore>,
    validator: TransitionValidator,
}

impl AuditLogWriter {
    pub fn new(store: Arc<dyn OrderStore>, validator: TransitionValidator) -> Self {
        Self { store, validator }
    }

    /// Entry describing `order` moving to `to`, stamped strictly after the
    /// order's last change.
    pub fn entry_for(
        &self,
        order: &Order,
        to: OrderStatus,
        actor: &str,
        note: Option<String>,
    ) -> AuditEntry {
        AuditEntry::new(
            order.id,
            order.status,
            to,
            actor,
            note,
            next_timestamp(order.updated_at, Utc::now()),
        )
    }

    /// Append a standalone entry after checking the move against the table.
    pub async fn append(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        actor: &str,
        note: Option<String>,
    ) -> Result<Uuid, OrderError> {
        self.validator.validate(from, to)?;

        let entry = AuditEntry::new(order_id, from, to, actor, note, Utc::now());
        let id = self.store.append_audit_entry(&entry).await?;

        tracing::debug!(order_id = %order_id, from = %from, to = %to, "Audit entry appended");
        Ok(id)
    }

    /// Full trail for one order, oldest first.
    pub async fn history(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, OrderError> {
        let mut entries = self.store.load_audit_entries(order_id).await?;
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    /// Replay the trail from `pending` and return the status it ends in.
    pub async fn verify_history(&self, order_id: Uuid) -> Result<OrderStatus, OrderError> {
        let entries = self.history(order_id).await?;
        replay(&self.validator, &entries)
    }
}

/// `now`, pushed forward when the clock has not moved past `last_change`.
fn next_timestamp(last_change: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = last_change + Duration::microseconds(1);
    now.max(floor)
}

fn replay(validator: &TransitionValidator, entries: &[AuditEntry]) -> Result<OrderStatus, OrderError> {
    let mut current = OrderStatus::Pending;

    for (index, entry) in entries.iter().enumerate() {
        let expected_sequence = index as i64 + 1;
        if entry.sequence != expected_sequence {
            return Err(OrderError::Validation(format!(
                "audit trail of order {} has sequence {} at position {}",
                entry.order_id, entry.sequence, expected_sequence
            )));
        }
        if entry.from_status != current {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: entry.to_status,
            });
        }
        validator.validate(current, entry.to_status)?;
        current = entry.to_status;
    }

    Ok(current)
}

// ============================================================================
// Unit Tests
// ============================================================================
