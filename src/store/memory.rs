use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderStore, StorageError};
use crate::domain::order::{AuditEntry, Order, OrderStatus};
use crate::domain::statistics::{AggregateKey, AggregateSnapshot, OrderTotals};

/// In-memory backend. Every call holds one lock for its whole duration, so
/// compound operations (`commit_transition`, CAS) are atomic.
pub struct MemoryOrderStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    audit: HashMap<Uuid, Vec<AuditEntry>>,
    aggregates: HashMap<AggregateKey, AggregateSnapshot>,
}

impl MemoryState {
    fn push_audit(&mut self, entry: &AuditEntry) -> Uuid {
        let log = self.audit.entry(entry.order_id).or_default();
        let mut stored = entry.clone();
        stored.sequence = log.len() as i64 + 1;
        log.push(stored);
        entry.id
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn load_order(&self, id: Uuid) -> Result<Order, StorageError> {
        self.check_available()?;
        let state = self.state.read().await;
        state.orders.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StorageError::Conflict(format!("order {} already exists", order.id)));
        }
        if state.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(StorageError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save_order_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(&id).ok_or(StorageError::NotFound)?;
        order.status = new_status;
        order.updated_at = updated_at;
        Ok(())
    }

    async fn mark_order_deleted(&self, id: Uuid) -> Result<(), StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(&id).ok_or(StorageError::NotFound)?;
        order.is_deleted = true;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        Ok(state.push_audit(entry))
    }

    async fn load_audit_entries(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StorageError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.audit.get(&order_id).cloned().unwrap_or_default())
    }

    async fn commit_transition(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&entry.order_id)
            .filter(|o| !o.is_deleted)
            .ok_or(StorageError::NotFound)?;
        if order.status != entry.from_status {
            return Err(StorageError::Conflict(format!(
                "order {} is {}, expected {}",
                entry.order_id, order.status, entry.from_status
            )));
        }
        order.status = entry.to_status;
        order.updated_at = entry.recorded_at;
        Ok(state.push_audit(entry))
    }

    async fn load_aggregate(&self, key: &AggregateKey) -> Result<AggregateSnapshot, StorageError> {
        self.check_available()?;
        let state = self.state.read().await;
        state.aggregates.get(key).cloned().ok_or(StorageError::NotFound)
    }

    async fn compare_and_swap_aggregate(
        &self,
        key: &AggregateKey,
        expected_version: u64,
        value: &OrderTotals,
    ) -> Result<bool, StorageError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let current_version = state.aggregates.get(key).map(|s| s.version).unwrap_or(0);
        if current_version != expected_version {
            return Ok(false);
        }
        state.aggregates.insert(
            key.clone(),
            AggregateSnapshot {
                key: key.clone(),
                value: value.clone(),
                version: expected_version + 1,
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }
}
