// ============================================================================
// Persistence Port
// ============================================================================
//
// Everything the lifecycle engine reads or writes goes through `OrderStore`.
// Two backends ship with the crate:
// - `MemoryOrderStore` for tests and the demo binary
// - `PgOrderStore` backed by Postgres via sqlx
//
// ============================================================================

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{AuditEntry, Order, OrderStatus};
use crate::domain::statistics::{AggregateKey, AggregateSnapshot, OrderTotals};

mod memory;
mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist.
    #[error("Not found")]
    NotFound,
    /// A write targeted a row whose state changed since it was read.
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    /// The backend could not be reached or refused the operation.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// Stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load one order, deleted or not.
    async fn load_order(&self, id: Uuid) -> Result<Order, StorageError>;

    /// Insert a new order row.
    async fn insert_order(&self, order: &Order) -> Result<(), StorageError>;

    /// Overwrite the status of an order and bump `updated_at`.
    async fn save_order_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StorageError>;

    /// Set the soft-delete flag.
    async fn mark_order_deleted(&self, id: Uuid) -> Result<(), StorageError>;

    /// Append one audit entry; storage assigns the per-order sequence.
    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<Uuid, StorageError>;

    /// Audit entries for one order, oldest first.
    async fn load_audit_entries(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StorageError>;

    /// Status write and audit append as one unit of work.
    ///
    /// The write only applies while the stored status still equals
    /// `entry.from_status`; otherwise `StorageError::Conflict` is returned and
    /// nothing is written. Missing or soft-deleted orders yield `NotFound`.
    async fn commit_transition(&self, entry: &AuditEntry) -> Result<Uuid, StorageError>;

    async fn load_aggregate(&self, key: &AggregateKey) -> Result<AggregateSnapshot, StorageError>;

    /// Replace the aggregate only if its stored version equals
    /// `expected_version` (0 meaning "absent"), bumping the version by one.
    /// Returns `false` when the comparison fails.
    async fn compare_and_swap_aggregate(
        &self,
        key: &AggregateKey,
        expected_version: u64,
        value: &OrderTotals,
    ) -> Result<bool, StorageError>;
}
