use std::sync::Arc;

use super::errors::StatsError;
use super::value_objects::{AggregateKey, AggregateSnapshot, TotalsDelta};
use crate::store::{OrderStore, StorageError};

// ============================================================================
// Statistics Consistency Guard
// ============================================================================
//
// Version-gated update path for aggregate records. A writer presents the
// version it read; the store compares and writes in one operation. Stale
// writers get `VersionConflict` and nothing is written. The guard never
// retries; callers decide whether to re-read.
//
// ============================================================================

pub struct StatisticsGuard {
    store: Arc<dyn OrderStore>,
}

impl StatisticsGuard {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Current snapshot, `None` when the record has never been written.
    pub async fn read(&self, key: &AggregateKey) -> Result<Option<AggregateSnapshot>, StatsError> {
        match self.store.load_aggregate(key).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `delta` on top of `expected_version` and return the new version.
    ///
    /// A missing record may be created by presenting version 0.
    pub async fn update_aggregate(
        &self,
        key: &AggregateKey,
        expected_version: u64,
        delta: &TotalsDelta,
    ) -> Result<u64, StatsError> {
        let current = self.read(key).await?;

        let base = match current {
            Some(snapshot) if snapshot.version == expected_version => snapshot.value,
            Some(snapshot) => {
                tracing::debug!(
                    key = %key,
                    expected_version,
                    actual_version = snapshot.version,
                    "Rejecting stale aggregate write"
                );
                return Err(StatsError::VersionConflict {
                    key: key.to_string(),
                    expected: expected_version,
                    actual: snapshot.version,
                });
            }
            None if expected_version == 0 => Default::default(),
            None => return Err(StatsError::NotFound(key.clone())),
        };

        let next = delta.apply(&base)?;

        let swapped = self
            .store
            .compare_and_swap_aggregate(key, expected_version, &next)
            .await?;

        if !swapped {
            // Lost the race between the read above and the conditional write.
            let actual = self
                .read(key)
                .await?
                .map(|s| s.version)
                .unwrap_or(0);
            tracing::debug!(
                key = %key,
                expected_version,
                actual_version = actual,
                "Aggregate changed before conditional write"
            );
            return Err(StatsError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let new_version = expected_version + 1;
        tracing::debug!(key = %key, new_version, "Aggregate updated");
        Ok(new_version)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
