use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::domain::statistics::StatsError;
use crate::store::StorageError;

// ============================================================================
// Order Lifecycle Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Version conflict on aggregate {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl OrderError {
    /// Business failures a batch may record per item instead of aborting.
    pub fn is_item_failure(&self) -> bool {
        matches!(self, OrderError::NotFound(_) | OrderError::InvalidTransition { .. })
    }

    /// Short, stable name for logs, metrics and batch failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) => "not_found",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::VersionConflict { .. } => "version_conflict",
            OrderError::Validation(_) => "validation",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl From<StatsError> for OrderError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::NotFound(key) => {
                OrderError::Validation(format!("aggregate {key} has not been initialised"))
            }
            StatsError::VersionConflict { key, expected, actual } => {
                OrderError::VersionConflict { key, expected, actual }
            }
            StatsError::Validation(msg) => OrderError::Validation(msg),
            StatsError::Storage(e) => OrderError::Storage(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_failures() {
        assert!(OrderError::NotFound(Uuid::new_v4()).is_item_failure());
        assert!(OrderError::InvalidTransition {
            from: OrderStatus::Completed,
            to: OrderStatus::Confirmed,
        }
        .is_item_failure());
        assert!(!OrderError::Validation("empty".into()).is_item_failure());
        assert!(!OrderError::Storage(StorageError::Unavailable("down".into())).is_item_failure());
    }

    #[test]
    fn test_invalid_transition_message_names_both_states() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Confirmed,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Invalid status transition from confirmed to pending");
    }
}
