//! The persistence layer realizes the "remember entities" mode by strategy
//! injection rather than by subclassing [`crate::shard::Shard`]: a no-op
//! strategy realizes the plain Shard, a journaled strategy realizes the
//! remembered-entities Shard, and the Shard's control flow is identical in
//! both cases.

mod journal;
mod noop;
mod snapshot;

pub use journal::{InMemoryJournal, Journal};
pub use noop::NoopPersistence;
pub use snapshot::{InMemorySnapshotStore, SnapshotStore};

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::id::EntityId;
use crate::recovery::{EntityRecoveryStrategy, RecoveryBatch};
use crate::settings::ShardSettings;

/// A persisted event: the ground truth for which entities are remembered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// An entity was started (or a restart of an already-known one).
    EntityStarted(EntityId),
    /// An entity was cleanly stopped.
    EntityStopped(EntityId),
}

/// The snapshot body: the remembered entity id set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Entity ids remembered as having a live (or restartable) worker.
    pub entities: HashSet<EntityId>,
}

/// The outcome of replaying this Shard's history at startup.
pub struct Recovered {
    /// The reconstructed remembered-entity set.
    pub entities: HashSet<EntityId>,
    /// Batches of ids to restart, paced by the configured recovery
    /// strategy. Empty for a strategy (or persistence mode) with nothing to
    /// restart.
    pub batches: Vec<RecoveryBatch>,
}

/// The capability a [`crate::shard::Shard`] composes with to decide whether
/// (and how) entity membership durably survives restarts.
///
/// `NoopPersistence` realizes the plain Shard: `entities` is always empty at
/// recovery and every `persist_*` call is a synchronous no-op. A journaled
/// implementation realizes the remember-entities Shard: `persist_started`/
/// `persist_stopped` append to a journal (snapshotting first when the
/// configured boundary is hit) and only return once the journal has
/// acknowledged the write.
#[async_trait]
pub trait PersistenceStrategy<M>: Send + Sync {
    /// Whether this strategy durably remembers entity membership.
    ///
    /// Gates whether an unexpected (non-passivating) entity termination with
    /// an empty buffer schedules a back-off restart instead of being
    /// treated as a normal stop.
    fn remembers_entities(&self) -> bool;

    /// Replays history (if any) to reconstruct the remembered-entity set and
    /// the batches of ids to restart.
    async fn recover(&mut self) -> Result<Recovered>;

    /// Records that `id` has (re)started. `current_state` is the Shard's
    /// state *before* this event is applied, used by journaled strategies to
    /// decide whether a snapshot boundary was crossed.
    async fn persist_started(&mut self, id: &EntityId, current_state: &State) -> Result<()>;

    /// Records that `id` has cleanly stopped. `current_state` is the
    /// Shard's state *before* this event is applied.
    async fn persist_stopped(&mut self, id: &EntityId, current_state: &State) -> Result<()>;
}

pub(crate) fn apply_event(state: &mut State, event: &Event) {
    match event {
        Event::EntityStarted(id) => {
            state.entities.insert(id.clone());
        },
        Event::EntityStopped(id) => {
            state.entities.remove(id);
        },
    }
}

/// Builds the persistence id used by journaled strategies, exactly
/// `/sharding/{type_name}Shard/{shard_id}`.
#[must_use]
pub fn persistence_id(type_name: &str, shard_id: &str) -> String {
    format!("/sharding/{type_name}Shard/{shard_id}")
}

/// Configuration for a [`JournaledPersistence`] strategy.
#[derive(Clone)]
pub struct JournaledPersistenceConfig {
    pub persistence_id: String,
    pub snapshot_after: u64,
    pub recovery_strategy: std::sync::Arc<dyn EntityRecoveryStrategy>,
    /// Opaque backend identifier, prefixed onto every key this strategy
    /// hands to its [`Journal`]; the bundled in-memory journal just treats
    /// it as part of the key, but it lets an embedder's own `Journal` back
    /// several Shards with one physical store and still partition by
    /// backend.
    pub journal_plugin_id: String,
    /// As `journal_plugin_id`, but prefixed onto keys handed to the
    /// [`SnapshotStore`].
    pub snapshot_plugin_id: String,
}

impl JournaledPersistenceConfig {
    /// Builds a config for `persistence_id` from a [`ShardSettings`]
    /// bundle, consuming its recovery-pacing and plugin-id fields.
    #[must_use]
    pub fn from_settings(persistence_id: String, settings: &ShardSettings) -> Self {
        Self {
            persistence_id,
            snapshot_after: settings.snapshot_after,
            recovery_strategy: settings.recovery_strategy(),
            journal_plugin_id: settings.journal_plugin_id.clone(),
            snapshot_plugin_id: settings.snapshot_plugin_id.clone(),
        }
    }
}

/// A journaled [`PersistenceStrategy`]: the remember-entities mode.
///
/// Events are the ground truth; the in-memory `State` the Shard holds is a
/// cache rebuildable by replay. `saveSnapshotWhenNeeded` fires when
/// `last_sequence_nr > 0` and `last_sequence_nr % snapshot_after == 0`,
/// before the event that would cross the boundary is appended. Snapshot
/// failures are logged at warning level and do not impair liveness; the
/// next boundary retries.
pub struct JournaledPersistence {
    journal: std::sync::Arc<dyn Journal>,
    snapshots: std::sync::Arc<dyn SnapshotStore>,
    config: JournaledPersistenceConfig,
    last_sequence_nr: u64,
}

impl JournaledPersistence {
    /// Builds a journaled strategy against the given journal/snapshot
    /// backends.
    #[must_use]
    pub fn new(
        journal: std::sync::Arc<dyn Journal>,
        snapshots: std::sync::Arc<dyn SnapshotStore>,
        config: JournaledPersistenceConfig,
    ) -> Self {
        Self { journal, snapshots, config, last_sequence_nr: 0 }
    }

    /// The key handed to the [`Journal`]: `persistence_id`, namespaced by
    /// `journal_plugin_id` when one is configured.
    fn journal_key(&self) -> String {
        if self.config.journal_plugin_id.is_empty() {
            self.config.persistence_id.clone()
        } else {
            format!("{}/{}", self.config.journal_plugin_id, self.config.persistence_id)
        }
    }

    /// As [`Self::journal_key`], for the [`SnapshotStore`].
    fn snapshot_key(&self) -> String {
        if self.config.snapshot_plugin_id.is_empty() {
            self.config.persistence_id.clone()
        } else {
            format!("{}/{}", self.config.snapshot_plugin_id, self.config.persistence_id)
        }
    }

    async fn save_snapshot_when_needed(&self, current_state: &State) {
        if self.last_sequence_nr > 0 && self.last_sequence_nr % self.config.snapshot_after == 0 {
            let key = self.snapshot_key();
            match self.snapshots.save(&key, self.last_sequence_nr, current_state).await {
                Ok(()) => tracing::debug!(
                    persistence_id = %self.config.persistence_id,
                    seq = self.last_sequence_nr,
                    "saved snapshot"
                ),
                Err(why) => tracing::warn!(
                    persistence_id = %self.config.persistence_id,
                    seq = self.last_sequence_nr,
                    error = %why,
                    "failed to save snapshot; next boundary will retry"
                ),
            }
        }
    }

    async fn persist_event(&mut self, event: Event, current_state: &State) -> Result<()> {
        self.save_snapshot_when_needed(current_state).await;

        let seq = self.last_sequence_nr + 1;
        let key = self.journal_key();
        self.journal.append(&key, seq, &event).await?;
        self.last_sequence_nr = seq;
        Ok(())
    }
}

#[async_trait]
impl<M: Send + 'static> PersistenceStrategy<M> for JournaledPersistence {
    fn remembers_entities(&self) -> bool {
        true
    }

    async fn recover(&mut self) -> Result<Recovered> {
        let baseline = self.snapshots.load_latest(&self.snapshot_key()).await?;
        let (mut state, from_seq) = match baseline {
            Some((seq, state)) => (state, seq),
            None => (State::default(), 0),
        };

        let events = self.journal.replay(&self.journal_key(), from_seq).await?;
        let mut last_seq = from_seq;
        for (seq, event) in events {
            apply_event(&mut state, &event);
            last_seq = last_seq.max(seq);
        }
        self.last_sequence_nr = last_seq;

        let ordered: Vec<EntityId> = state.entities.iter().cloned().collect();
        let batches = self.config.recovery_strategy.batches(ordered);

        Ok(Recovered { entities: state.entities, batches })
    }

    async fn persist_started(&mut self, id: &EntityId, current_state: &State) -> Result<()> {
        self.persist_event(Event::EntityStarted(id.clone()), current_state).await
    }

    async fn persist_stopped(&mut self, id: &EntityId, current_state: &State) -> Result<()> {
        self.persist_event(Event::EntityStopped(id.clone()), current_state).await
    }
}
