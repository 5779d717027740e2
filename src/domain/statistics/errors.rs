use super::value_objects::AggregateKey;
use crate::store::StorageError;

// ============================================================================
// Statistics Guard Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("Aggregate not found: {0}")]
    NotFound(AggregateKey),

    #[error("Version conflict on aggregate {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid aggregate update: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl StatsError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StatsError::VersionConflict { .. })
    }
}

impl crate::utils::IsTransient for StatsError {
    fn is_transient(&self) -> bool {
        self.is_conflict()
    }
}
