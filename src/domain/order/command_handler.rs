use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::domain::statistics::{AggregateKey, StatisticsGuard, StatsError, TotalsDelta};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StorageError};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::audit::AuditLogWriter;
use super::commands::TransitionOrderStatus;
use super::errors::OrderError;
use super::events::AuditEntry;
use super::transitions::TransitionValidator;
use super::value_objects::{NewOrder, Order, OrderStatus, OrderView};

// ============================================================================
// Order Transition Service
// ============================================================================
//
// Orchestrates: Command → Validator → (status write + audit append) → Aggregates
//
// The status write and its audit entry are committed together. A commit that
// finds the order moved underneath it re-validates against the fresh status.
// Aggregate statistics are adjusted afterwards through the version guard;
// conflicts there are retried, and an update that still cannot be written is
// dropped without failing the already-committed change.
//
// ============================================================================

/// Commit attempts per transition before a moving order is reported as an
/// invalid transition from its latest status.
const MAX_COMMIT_ATTEMPTS: u32 = OrderStatus::ALL.len() as u32;

pub struct OrderTransitionService {
    store: Arc<dyn OrderStore>,
    validator: TransitionValidator,
    audit: AuditLogWriter,
    guard: StatisticsGuard,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
    track_aggregates: bool,
}

impl OrderTransitionService {
    pub fn new(store: Arc<dyn OrderStore>, validator: TransitionValidator, metrics: Arc<Metrics>) -> Self {
        Self {
            audit: AuditLogWriter::new(store.clone(), validator.clone()),
            guard: StatisticsGuard::new(store.clone()),
            store,
            validator,
            metrics,
            retry: RetryConfig::default(),
            track_aggregates: true,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_aggregate_tracking(mut self, enabled: bool) -> Self {
        self.track_aggregates = enabled;
        self
    }

    pub fn audit(&self) -> &AuditLogWriter {
        &self.audit
    }

    pub fn guard(&self) -> &StatisticsGuard {
        &self.guard
    }

    /// Move one order to `command.target`.
    pub async fn transition(
        &self,
        order_id: Uuid,
        command: &TransitionOrderStatus,
    ) -> Result<OrderView, OrderError> {
        let started = Instant::now();
        let result = self.apply_transition(order_id, command).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok((from, view)) => {
                self.metrics
                    .record_transition(from.as_str(), view.status.as_str(), elapsed);
            }
            Err(OrderError::Storage(e)) => {
                self.metrics.record_transition_error(elapsed);
                self.metrics.record_storage_error("transition");
                tracing::warn!(order_id = %order_id, target = %command.target, error = %e, "Transition failed");
            }
            Err(e) => {
                self.metrics.record_rejection(e.kind(), elapsed);
                tracing::debug!(
                    order_id = %order_id,
                    target = %command.target,
                    error = %e,
                    "Transition rejected"
                );
            }
        }

        result.map(|(_, view)| view)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        command: &TransitionOrderStatus,
    ) -> Result<(OrderStatus, OrderView), OrderError> {
        command.validate()?;
        let note = command.normalized_note();

        let mut order = self.load_active(order_id).await?;
        let mut attempts = 0;
        let entry = loop {
            self.validator.validate(order.status, command.target)?;
            attempts += 1;

            match self.commit(&order, command, note.clone()).await {
                Ok(entry) => break entry,
                Err(OrderError::Storage(StorageError::Conflict(reason))) => {
                    // Someone else moved the order after we read it.
                    tracing::warn!(
                        order_id = %order_id,
                        read_status = %order.status,
                        attempts,
                        reason = %reason,
                        "Order changed during transition, re-validating"
                    );
                    let fresh = self.load_active(order_id).await?;
                    if attempts >= MAX_COMMIT_ATTEMPTS {
                        return Err(OrderError::InvalidTransition {
                            from: fresh.status,
                            to: command.target,
                        });
                    }
                    order = fresh;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            order_id = %order_id,
            from = %entry.from_status,
            to = %entry.to_status,
            actor = %entry.actor,
            "{}",
            entry.summary()
        );

        if self.track_aggregates {
            self.bump_aggregates(&order, &TotalsDelta::transitioned(&order, entry.to_status))
                .await;
        }

        let from = order.status;
        let mut updated = order;
        updated.status = entry.to_status;
        updated.updated_at = entry.recorded_at;
        Ok((from, updated.view()))
    }

    async fn commit(
        &self,
        order: &Order,
        command: &TransitionOrderStatus,
        note: Option<String>,
    ) -> Result<AuditEntry, OrderError> {
        let entry = self.audit.entry_for(order, command.target, &command.actor, note);
        match self.store.commit_transition(&entry).await {
            Ok(_) => Ok(entry),
            // Deleted between our read and the commit.
            Err(StorageError::NotFound) => Err(OrderError::NotFound(order.id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Allowed next states of an active order, in canonical order.
    pub async fn available_transitions(&self, order_id: Uuid) -> Result<Vec<OrderStatus>, OrderError> {
        let order = self.load_active(order_id).await?;
        Ok(self.validator.next_states(order.status))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView, OrderError> {
        Ok(self.load_active(order_id).await?.view())
    }

    /// Create an order in `pending` and count it in the aggregates.
    pub async fn register_order(&self, new_order: NewOrder) -> Result<OrderView, OrderError> {
        new_order.validate()?;
        let order = Order::new(new_order);

        match self.store.insert_order(&order).await {
            Ok(()) => {}
            Err(StorageError::Conflict(reason)) => return Err(OrderError::Validation(reason)),
            Err(e) => {
                self.metrics.record_storage_error("register_order");
                return Err(e.into());
            }
        }

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            order_type = order.order_type.as_str(),
            "Order registered"
        );

        if self.track_aggregates {
            self.bump_aggregates(&order, &TotalsDelta::registered(&order)).await;
        }

        Ok(order.view())
    }

    /// Flag an order as deleted and take it out of the aggregates.
    pub async fn soft_delete_order(&self, order_id: Uuid) -> Result<(), OrderError> {
        let order = self.load_active(order_id).await?;

        match self.store.mark_order_deleted(order_id).await {
            Ok(()) => {}
            Err(StorageError::NotFound) => return Err(OrderError::NotFound(order_id)),
            Err(e) => {
                self.metrics.record_storage_error("soft_delete_order");
                return Err(e.into());
            }
        }

        tracing::info!(order_id = %order_id, status = %order.status, "Order soft-deleted");

        if self.track_aggregates {
            self.bump_aggregates(&order, &TotalsDelta::removed(&order)).await;
        }
        Ok(())
    }

    async fn load_active(&self, order_id: Uuid) -> Result<Order, OrderError> {
        match self.store.load_order(order_id).await {
            Ok(order) if order.is_deleted => Err(OrderError::NotFound(order_id)),
            Ok(order) => Ok(order),
            Err(StorageError::NotFound) => Err(OrderError::NotFound(order_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `delta` to the all-time record and to the daily record of the
    /// order's creation date.
    ///
    /// Runs after the order change is committed, so nothing here fails the
    /// caller: conflicts are retried, and an update that still cannot be
    /// written is logged and counted, leaving that record stale.
    async fn bump_aggregates(&self, order: &Order, delta: &TotalsDelta) {
        if delta.is_empty() {
            return;
        }

        for key in [AggregateKey::order_totals(), AggregateKey::daily_for(order.created_at)] {
            self.bump_aggregate(order.id, &key, delta).await;
        }
    }

    async fn bump_aggregate(&self, order_id: Uuid, key: &AggregateKey, delta: &TotalsDelta) {
        let outcome = retry_on_transient(&self.retry, |_attempt| async move {
            let expected = self.guard.read(key).await?.map_or(0, |s| s.version);
            self.guard.update_aggregate(key, expected, delta).await
        })
        .await;

        match outcome {
            RetryResult::Success { value: version, attempts } => {
                self.metrics.record_aggregate_update(attempts - 1);
                tracing::debug!(key = %key, version, attempts, "Aggregate statistics updated");
            }
            RetryResult::Exhausted { error, attempts } => {
                self.metrics.record_aggregate_abandoned(attempts);
                tracing::error!(
                    order_id = %order_id,
                    key = %key,
                    attempts,
                    error = %error,
                    "Giving up on aggregate update after repeated version conflicts"
                );
            }
            RetryResult::PermanentFailure(StatsError::Storage(e)) => {
                self.metrics.record_storage_error("aggregate_update");
                self.metrics.record_aggregate_abandoned(0);
                tracing::error!(
                    order_id = %order_id,
                    key = %key,
                    error = %e,
                    "Aggregate update lost to a storage failure"
                );
            }
            RetryResult::PermanentFailure(error) => {
                self.metrics.record_aggregate_abandoned(0);
                tracing::error!(order_id = %order_id, key = %key, error = %error, "Aggregate update rejected");
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderType, PaymentStatus};
    use crate::domain::statistics::{AggregateSnapshot, OrderTotals};
    use crate::store::MemoryOrderStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Memory store that can inject rival transitions or a delete right
    /// before a commit, refuse every aggregate write, or fail aggregate reads.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryOrderStore,
        rival_moves: Mutex<VecDeque<OrderStatus>>,
        delete_before_commit: AtomicBool,
        refuse_cas: AtomicBool,
        fail_aggregate_reads: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for ScriptedStore {
        async fn load_order(&self, id: Uuid) -> Result<Order, StorageError> {
            self.inner.load_order(id).await
        }

        async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
            self.inner.insert_order(order).await
        }

        async fn save_order_status(
            &self,
            id: Uuid,
            new_status: OrderStatus,
            updated_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.inner.save_order_status(id, new_status, updated_at).await
        }

        async fn mark_order_deleted(&self, id: Uuid) -> Result<(), StorageError> {
            self.inner.mark_order_deleted(id).await
        }

        async fn append_audit_entry(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
            self.inner.append_audit_entry(entry).await
        }

        async fn load_audit_entries(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, StorageError> {
            self.inner.load_audit_entries(order_id).await
        }

        async fn commit_transition(&self, entry: &AuditEntry) -> Result<Uuid, StorageError> {
            if self.delete_before_commit.swap(false, Ordering::SeqCst) {
                self.inner.mark_order_deleted(entry.order_id).await?;
            }
            let rival = self.rival_moves.lock().await.pop_front();
            if let Some(rival) = rival {
                let rival_entry = AuditEntry::new(
                    entry.order_id,
                    entry.from_status,
                    rival,
                    "rival",
                    None,
                    Utc::now(),
                );
                self.inner.commit_transition(&rival_entry).await?;
            }
            self.inner.commit_transition(entry).await
        }

        async fn load_aggregate(&self, key: &AggregateKey) -> Result<AggregateSnapshot, StorageError> {
            if self.fail_aggregate_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("aggregate table down".into()));
            }
            self.inner.load_aggregate(key).await
        }

        async fn compare_and_swap_aggregate(
            &self,
            key: &AggregateKey,
            expected_version: u64,
            value: &OrderTotals,
        ) -> Result<bool, StorageError> {
            if self.refuse_cas.load(Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.compare_and_swap_aggregate(key, expected_version, value).await
        }
    }

    fn new_order(number: &str) -> NewOrder {
        NewOrder {
            order_number: number.to_string(),
            order_type: OrderType::Sales,
            total_amount: Decimal::new(10000, 2),
            payment_status: PaymentStatus::Paid,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn service(store: Arc<dyn OrderStore>) -> (OrderTransitionService, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderTransitionService::new(store, TransitionValidator::default(), metrics.clone())
            .with_retry(fast_retry());
        (service, metrics)
    }

    #[tokio::test]
    async fn test_transition_writes_status_audit_and_aggregates() {
        let store = Arc::new(MemoryOrderStore::new());
        let (service, metrics) = service(store.clone());
        let order = service.register_order(new_order("ORD-1")).await.unwrap();

        let view = service
            .transition(
                order.id,
                &TransitionOrderStatus::new(OrderStatus::Confirmed, "alice").with_note("  paid  "),
            )
            .await
            .unwrap();

        assert_eq!(view.status, OrderStatus::Confirmed);
        assert!(view.updated_at > order.updated_at);
        assert_eq!(store.load_order(order.id).await.unwrap().status, OrderStatus::Confirmed);

        let history = service.audit().history(order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].note.as_deref(), Some("paid"));
        assert_eq!(history[0].actor, "alice");

        let totals = service.guard().read(&AggregateKey::order_totals()).await.unwrap().unwrap();
        assert_eq!(totals.version, 2);
        assert_eq!(totals.value.count(OrderStatus::Pending), 0);
        assert_eq!(totals.value.count(OrderStatus::Confirmed), 1);
        assert_eq!(metrics.transitions_total.with_label_values(&["pending", "confirmed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_invalid_transition_writes_nothing() {
        let store = Arc::new(MemoryOrderStore::new());
        let (service, metrics) = service(store.clone());
        let order = service.register_order(new_order("ORD-2")).await.unwrap();
        service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Cancelled, "ops"))
            .await
            .unwrap();

        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed,
            }
        ));
        assert_eq!(service.audit().history(order.id).await.unwrap().len(), 1);
        assert_eq!(
            metrics
                .transition_rejections_total
                .with_label_values(&["invalid_transition"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_same_status_is_rejected() {
        let (service, _) = service(Arc::new(MemoryOrderStore::new()));
        let order = service.register_order(new_order("ORD-3")).await.unwrap();

        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Pending, "ops"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_blank_actor_rejected_before_load() {
        let (service, _) = service(Arc::new(MemoryOrderStore::new()));
        let err = service
            .transition(Uuid::new_v4(), &TransitionOrderStatus::new(OrderStatus::Confirmed, " "))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deleted_order_is_not_found() {
        let (service, _) = service(Arc::new(MemoryOrderStore::new()));
        let order = service.register_order(new_order("ORD-4")).await.unwrap();
        service.soft_delete_order(order.id).await.unwrap();

        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(id) if id == order.id));
        assert!(matches!(
            service.soft_delete_order(order.id).await,
            Err(OrderError::NotFound(_))
        ));

        let totals = service.guard().read(&AggregateKey::order_totals()).await.unwrap().unwrap();
        assert_eq!(totals.value.total_orders, 0);
    }

    #[tokio::test]
    async fn test_available_transitions() {
        let (service, _) = service(Arc::new(MemoryOrderStore::new()));
        let order = service.register_order(new_order("ORD-5")).await.unwrap();
        service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Delivered, "ops"))
            .await
            .unwrap();

        assert_eq!(
            service.available_transitions(order.id).await.unwrap(),
            vec![OrderStatus::Completed, OrderStatus::Cancelled]
        );
    }

    #[tokio::test]
    async fn test_duplicate_order_number_rejected() {
        let (service, _) = service(Arc::new(MemoryOrderStore::new()));
        service.register_order(new_order("ORD-6")).await.unwrap();
        let err = service.register_order(new_order("ORD-6")).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rival_move_still_compatible_is_retried() {
        let store = Arc::new(ScriptedStore::default());
        let (service, _) = service(store.clone());
        let service = service.with_aggregate_tracking(false);
        let order = service.register_order(new_order("ORD-7")).await.unwrap();

        store.rival_moves.lock().await.push_back(OrderStatus::Confirmed);
        let view = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Shipped, "ops"))
            .await
            .unwrap();

        assert_eq!(view.status, OrderStatus::Shipped);
        let history = service.audit().history(order.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].from_status, OrderStatus::Confirmed);
        assert_eq!(service.audit().verify_history(order.id).await.unwrap(), OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_rival_move_making_request_invalid() {
        let store = Arc::new(ScriptedStore::default());
        let (service, _) = service(store.clone());
        let service = service.with_aggregate_tracking(false);
        let order = service.register_order(new_order("ORD-8")).await.unwrap();

        store.rival_moves.lock().await.push_back(OrderStatus::Cancelled);
        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed,
            }
        ));
        assert_eq!(service.audit().history(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_aggregate_retries_do_not_fail_transition() {
        let store = Arc::new(ScriptedStore::default());
        let (service, metrics) = service(store.clone());
        let order = service.register_order(new_order("ORD-9")).await.unwrap();

        store.refuse_cas.store(true, Ordering::SeqCst);
        let view = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap();

        assert_eq!(view.status, OrderStatus::Confirmed);
        // All-time and daily records each give up after three refused writes.
        assert_eq!(metrics.aggregate_updates_abandoned_total.get(), 2);
        assert_eq!(metrics.aggregate_conflicts_total.get(), 6);

        let totals = service.guard().read(&AggregateKey::order_totals()).await.unwrap().unwrap();
        assert_eq!(totals.version, 1);
        assert_eq!(totals.value.count(OrderStatus::Pending), 1);
    }

    #[tokio::test]
    async fn test_storage_outage_propagates() {
        let store = Arc::new(MemoryOrderStore::new());
        let (service, metrics) = service(store.clone());
        let order = service.register_order(new_order("ORD-10")).await.unwrap();

        store.set_unavailable(true);
        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Storage(StorageError::Unavailable(_))));
        assert_eq!(metrics.storage_errors_total.with_label_values(&["transition"]).get(), 1);
        assert_eq!(
            metrics
                .transition_rejections_total
                .with_label_values(&["storage"])
                .get(),
            0
        );
    }

    #[tokio::test]
    async fn test_aggregate_outage_after_commit_keeps_transition() {
        let store = Arc::new(ScriptedStore::default());
        let (service, metrics) = service(store.clone());
        let service = Arc::new(service);
        let a = service.register_order(new_order("ORD-11")).await.unwrap();
        let b = service.register_order(new_order("ORD-12")).await.unwrap();

        store.fail_aggregate_reads.store(true, Ordering::SeqCst);
        let batch = crate::domain::order::BatchTransitionExecutor::new(service.clone(), metrics.clone());
        let result = batch
            .execute(&[a.id, b.id], &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(service.get_order(a.id).await.unwrap().status, OrderStatus::Confirmed);
        assert_eq!(service.audit().history(a.id).await.unwrap().len(), 1);
        // Two records (all-time + daily) per order.
        assert_eq!(metrics.storage_errors_total.with_label_values(&["aggregate_update"]).get(), 4);
        assert_eq!(metrics.aggregate_updates_abandoned_total.get(), 4);

        // A registration during the outage is still stored.
        let c = service.register_order(new_order("ORD-13")).await.unwrap();
        assert_eq!(service.get_order(c.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_two_rival_moves_still_compatible() {
        let store = Arc::new(ScriptedStore::default());
        let (service, _) = service(store.clone());
        let service = service.with_aggregate_tracking(false);
        let order = service.register_order(new_order("ORD-14")).await.unwrap();

        {
            let mut rivals = store.rival_moves.lock().await;
            rivals.push_back(OrderStatus::Confirmed);
            rivals.push_back(OrderStatus::Processing);
        }
        let view = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Shipped, "ops"))
            .await
            .unwrap();

        assert_eq!(view.status, OrderStatus::Shipped);
        let history = service.audit().history(order.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].from_status, OrderStatus::Processing);
        assert_eq!(service.audit().verify_history(order.id).await.unwrap(), OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_second_rival_move_overtakes_request() {
        let store = Arc::new(ScriptedStore::default());
        let (service, _) = service(store.clone());
        let service = service.with_aggregate_tracking(false);
        let order = service.register_order(new_order("ORD-15")).await.unwrap();

        {
            let mut rivals = store.rival_moves.lock().await;
            rivals.push_back(OrderStatus::Confirmed);
            rivals.push_back(OrderStatus::Delivered);
        }
        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Shipped, "ops"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Shipped,
            }
        ));
        assert_eq!(service.audit().history(order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_before_commit_is_not_found() {
        let store = Arc::new(ScriptedStore::default());
        let (service, _) = service(store.clone());
        let order = service.register_order(new_order("ORD-16")).await.unwrap();

        store.delete_before_commit.store(true, Ordering::SeqCst);
        let err = service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Confirmed, "ops"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::NotFound(id) if id == order.id));
        assert!(err.is_item_failure());
        assert!(service.audit().history(order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_record_follows_creation_date() {
        let store = Arc::new(MemoryOrderStore::new());
        let (service, _) = service(store);
        let order = service.register_order(new_order("ORD-17")).await.unwrap();
        service
            .transition(order.id, &TransitionOrderStatus::new(OrderStatus::Cancelled, "ops"))
            .await
            .unwrap();

        let daily = service
            .guard()
            .read(&AggregateKey::daily_for(order.created_at))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.version, 2);
        assert_eq!(daily.value.total_orders, 1);
        assert_eq!(daily.value.count(OrderStatus::Cancelled), 1);
        assert_eq!(daily.value.cancellation_rate(), Decimal::new(10000, 2));
    }
}
