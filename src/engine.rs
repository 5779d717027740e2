use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::order::{
    AuditEntry, BatchOperationResult, BatchTransitionExecutor, NewOrder, OrderError,
    OrderStatus, OrderTransitionService, OrderView, TransitionOrderStatus, TransitionTable,
    TransitionValidator,
};
use crate::domain::statistics::{AggregateKey, AggregateSnapshot, OrderTotals};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StorageError};

// ============================================================================
// Order Lifecycle Engine
// ============================================================================
//
// Entry point for callers: wires the transition service, batch executor,
// audit writer and statistics guard over one store and one transition table.
//
// ============================================================================

/// Widest span `order_totals_between` accepts, in days.
pub const MAX_TOTALS_RANGE_DAYS: i64 = 366;

pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    service: Arc<OrderTransitionService>,
    batch: BatchTransitionExecutor,
}

impl OrderLifecycle {
    /// Engine over the standard transition table.
    pub fn new(store: Arc<dyn OrderStore>, config: &EngineConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_table(store, Arc::new(TransitionTable::standard()), config, metrics)
    }

    pub fn with_table(
        store: Arc<dyn OrderStore>,
        table: Arc<TransitionTable>,
        config: &EngineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let service = Arc::new(
            OrderTransitionService::new(store.clone(), TransitionValidator::new(table), metrics.clone())
                .with_retry(config.retry.clone())
                .with_aggregate_tracking(config.track_aggregates),
        );
        let batch = BatchTransitionExecutor::new(service.clone(), metrics)
            .with_max_batch_size(config.max_batch_size);

        Self { store, service, batch }
    }

    pub async fn transition_order_status(
        &self,
        order_id: Uuid,
        command: &TransitionOrderStatus,
    ) -> Result<OrderView, OrderError> {
        self.service.transition(order_id, command).await
    }

    pub async fn batch_transition_order_status(
        &self,
        order_ids: &[Uuid],
        command: &TransitionOrderStatus,
    ) -> Result<BatchOperationResult, OrderError> {
        self.batch.execute(order_ids, command).await
    }

    /// Audit trail of an order, oldest first. Soft-deleted orders keep
    /// their history.
    pub async fn get_order_status_history(&self, order_id: Uuid) -> Result<Vec<AuditEntry>, OrderError> {
        match self.store.load_order(order_id).await {
            Ok(_) => {}
            Err(StorageError::NotFound) => return Err(OrderError::NotFound(order_id)),
            Err(e) => return Err(e.into()),
        }
        self.service.audit().history(order_id).await
    }

    /// Replay an order's trail through the transition table and check it
    /// ends in the order's stored status.
    pub async fn verify_order_history(&self, order_id: Uuid) -> Result<OrderStatus, OrderError> {
        let order = match self.store.load_order(order_id).await {
            Ok(order) => order,
            Err(StorageError::NotFound) => return Err(OrderError::NotFound(order_id)),
            Err(e) => return Err(e.into()),
        };
        let replayed = self.service.audit().verify_history(order_id).await?;
        if replayed != order.status {
            return Err(OrderError::Validation(format!(
                "audit trail of order {order_id} ends in {replayed}, order is {}",
                order.status
            )));
        }
        Ok(replayed)
    }

    pub async fn available_transitions(&self, order_id: Uuid) -> Result<Vec<OrderStatus>, OrderError> {
        self.service.available_transitions(order_id).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView, OrderError> {
        self.service.get_order(order_id).await
    }

    pub async fn register_order(&self, new_order: NewOrder) -> Result<OrderView, OrderError> {
        self.service.register_order(new_order).await
    }

    pub async fn soft_delete_order(&self, order_id: Uuid) -> Result<(), OrderError> {
        self.service.soft_delete_order(order_id).await
    }

    /// Current order totals; all zero before the first write.
    pub async fn order_totals(&self) -> Result<OrderTotals, OrderError> {
        Ok(self
            .aggregate_snapshot()
            .await?
            .map(|snapshot| snapshot.value)
            .unwrap_or_default())
    }

    pub async fn aggregate_snapshot(&self) -> Result<Option<AggregateSnapshot>, OrderError> {
        Ok(self.service.guard().read(&AggregateKey::order_totals()).await?)
    }

    /// Totals of the orders created on `day`.
    pub async fn daily_totals(&self, day: NaiveDate) -> Result<OrderTotals, OrderError> {
        Ok(self
            .service
            .guard()
            .read(&AggregateKey::daily(day))
            .await?
            .map(|snapshot| snapshot.value)
            .unwrap_or_default())
    }

    /// Totals of the orders created between `start` and `end`, both inclusive.
    /// A reversed range is swapped.
    pub async fn order_totals_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OrderTotals, OrderError> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let span = end.signed_duration_since(start).num_days() + 1;
        if span > MAX_TOTALS_RANGE_DAYS {
            return Err(OrderError::Validation(format!(
                "date range of {span} days exceeds the limit of {MAX_TOTALS_RANGE_DAYS}"
            )));
        }

        let mut totals = OrderTotals::default();
        for day in start.iter_days().take_while(|day| *day <= end) {
            totals.merge(&self.daily_totals(day).await?);
        }
        Ok(totals)
    }
}
