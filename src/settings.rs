use std::sync::Arc;
use std::time::Duration;

use crate::recovery::{AllAtOnce, ConstantRate, EntityRecoveryStrategy};

/// Tuning parameters for a [`crate::shard::Shard`].
///
/// Defaults are chosen to be reasonable for a small-to-medium production
/// deployment; embedders are expected to override them from their own
/// configuration layer (this crate does not own a config-file format).
#[derive(Debug, Clone)]
pub struct ShardSettings {
    /// Hard cap on total buffered (id-window) messages per Shard.
    pub buffer_size: usize,
    /// Event-count modulus for triggering a snapshot save (persistent
    /// variant only).
    pub snapshot_after: u64,
    /// Delay before auto-restarting an entity after an unexpected
    /// termination (persistent variant only).
    pub entity_restart_backoff: Duration,
    /// Which [`crate::recovery::EntityRecoveryStrategy`] to build at
    /// recovery time (persistent variant only).
    pub entity_recovery_strategy: RecoveryStrategyKind,
    /// Pacing interval for the constant-rate recovery strategy.
    pub entity_recovery_constant_rate_frequency: Duration,
    /// Batch size for the constant-rate recovery strategy.
    pub entity_recovery_constant_rate_number_of_entities: usize,
    /// Opaque journal backend identifier, forwarded to the injected
    /// `Journal` implementation.
    pub journal_plugin_id: String,
    /// Opaque snapshot backend identifier, forwarded to the injected
    /// `SnapshotStore` implementation.
    pub snapshot_plugin_id: String,
}

impl ShardSettings {
    /// Builds the [`EntityRecoveryStrategy`] selected by
    /// `entity_recovery_strategy`, paced by the `entity_recovery_constant_rate_*`
    /// fields when that strategy is [`RecoveryStrategyKind::ConstantRate`].
    #[must_use]
    pub fn recovery_strategy(&self) -> Arc<dyn EntityRecoveryStrategy> {
        match self.entity_recovery_strategy {
            RecoveryStrategyKind::All => Arc::new(AllAtOnce),
            RecoveryStrategyKind::ConstantRate => Arc::new(ConstantRate::new(
                self.entity_recovery_constant_rate_frequency,
                self.entity_recovery_constant_rate_number_of_entities,
            )),
        }
    }
}

/// Which recovery pacing strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategyKind {
    /// Restart every remembered entity in a single batch.
    All,
    /// Restart remembered entities in fixed-size batches, paced by a timer.
    ConstantRate,
}

impl Default for ShardSettings {
    fn default() -> Self {
        Self {
            buffer_size: 100_000,
            snapshot_after: 1_000,
            entity_restart_backoff: Duration::from_secs(10),
            entity_recovery_strategy: RecoveryStrategyKind::All,
            entity_recovery_constant_rate_frequency: Duration::from_millis(100),
            entity_recovery_constant_rate_number_of_entities: 5,
            journal_plugin_id: String::new(),
            snapshot_plugin_id: String::new(),
        }
    }
}
