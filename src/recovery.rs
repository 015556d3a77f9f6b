use std::time::Duration;

use crate::id::EntityId;

/// A batch of remembered entity ids to restart, and how long after recovery
/// completes the batch should resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryBatch {
    /// Delay from recovery-completed at which this batch should be
    /// delivered as a `RestartEntities` to self.
    pub delay: Duration,
    /// The entity ids in this batch.
    pub ids: Vec<EntityId>,
}

/// A pluggable pacing policy for restarting remembered entities after
/// recovery.
///
/// Given the full set of remembered ids at recovery time (in the order the
/// underlying collection iterates them), returns a collection of deferred
/// batches. The strategy only produces batches — the Shard is responsible
/// for scheduling their delivery and consuming them by re-spawning workers
/// for each id via `get_entity`, tolerating already-live ids.
pub trait EntityRecoveryStrategy: Send + Sync {
    /// Partitions `ids` into the batches this strategy wants delivered.
    fn batches(&self, ids: Vec<EntityId>) -> Vec<RecoveryBatch>;
}

/// Restarts every remembered entity in a single batch, immediately.
#[derive(Debug, Default)]
pub struct AllAtOnce;

impl EntityRecoveryStrategy for AllAtOnce {
    fn batches(&self, ids: Vec<EntityId>) -> Vec<RecoveryBatch> {
        if ids.is_empty() {
            Vec::new()
        } else {
            vec![RecoveryBatch { delay: Duration::ZERO, ids }]
        }
    }
}

/// Restarts remembered entities in fixed-size batches, one every
/// `frequency`.
///
/// Batch `k` (0-indexed) is scheduled to resolve at `(k + 1) * frequency`
/// from recovery-completed. The last batch may be smaller than
/// `number_of_entities`.
#[derive(Debug, Clone)]
pub struct ConstantRate {
    frequency: Duration,
    number_of_entities: usize,
}

impl ConstantRate {
    /// Creates a constant-rate strategy pacing `number_of_entities` ids per
    /// `frequency` interval.
    ///
    /// `number_of_entities` of zero is treated as one to avoid chunking into
    /// empty groups.
    #[must_use]
    pub fn new(frequency: Duration, number_of_entities: usize) -> Self {
        Self { frequency, number_of_entities: number_of_entities.max(1) }
    }
}

impl EntityRecoveryStrategy for ConstantRate {
    fn batches(&self, ids: Vec<EntityId>) -> Vec<RecoveryBatch> {
        ids.chunks(self.number_of_entities)
            .enumerate()
            .map(|(k, chunk)| RecoveryBatch {
                delay: self.frequency * (k as u32 + 1),
                ids: chunk.to_vec(),
            })
            .collect()
    }
}
