use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::Metrics;

use super::command_handler::OrderTransitionService;
use super::commands::TransitionOrderStatus;
use super::errors::OrderError;

/// Default upper bound on the number of orders in one batch call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

// ============================================================================
// Batch Transition Executor
// ============================================================================
//
// Applies one command to many orders, one at a time and in input order.
// Missing orders and disallowed moves are recorded per item; any other
// failure aborts the call and no partial result is returned.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    pub order_id: Uuid,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOperationResult {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub succeeded: Vec<Uuid>,
    pub failures: Vec<BatchItemFailure>,
}

impl BatchOperationResult {
    fn record_success(&mut self, order_id: Uuid) {
        self.succeeded.push(order_id);
        self.success_count += 1;
    }

    fn record_failure(&mut self, order_id: Uuid, error: &OrderError) {
        self.failures.push(BatchItemFailure {
            order_id,
            kind: error.kind().to_string(),
            reason: error.to_string(),
        });
        self.failure_count += 1;
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }
}

pub struct BatchTransitionExecutor {
    service: Arc<OrderTransitionService>,
    metrics: Arc<Metrics>,
    max_batch_size: usize,
}

impl BatchTransitionExecutor {
    pub fn new(service: Arc<OrderTransitionService>, metrics: Arc<Metrics>) -> Self {
        Self {
            service,
            metrics,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub async fn execute(
        &self,
        order_ids: &[Uuid],
        command: &TransitionOrderStatus,
    ) -> Result<BatchOperationResult, OrderError> {
        if order_ids.is_empty() {
            return Err(OrderError::Validation("batch contains no orders".into()));
        }
        if order_ids.len() > self.max_batch_size {
            return Err(OrderError::Validation(format!(
                "batch of {} orders exceeds the limit of {}",
                order_ids.len(),
                self.max_batch_size
            )));
        }
        command.validate()?;

        tracing::info!(
            size = order_ids.len(),
            target = %command.target,
            actor = %command.actor,
            "Starting batch transition"
        );

        let mut result = BatchOperationResult {
            total: order_ids.len(),
            ..Default::default()
        };

        for order_id in order_ids {
            match self.service.transition(*order_id, command).await {
                Ok(_) => result.record_success(*order_id),
                Err(e) if e.is_item_failure() => {
                    tracing::debug!(order_id = %order_id, error = %e, "Batch item failed");
                    result.record_failure(*order_id, &e);
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %order_id,
                        processed = result.success_count + result.failure_count,
                        error = %e,
                        "Aborting batch transition"
                    );
                    return Err(e);
                }
            }
        }

        self.metrics
            .record_batch(result.success_count, result.failure_count);
        tracing::info!(
            total = result.total,
            succeeded = result.success_count,
            failed = result.failure_count,
            "Batch transition finished"
        );

        Ok(result)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
