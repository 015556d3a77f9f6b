use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::State;
use crate::error::Result;

/// A point-in-time snapshot store keyed by persistence id, used to bound
/// journal replay length.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves `state` as the snapshot at `sequence_nr`, superseding any prior
    /// snapshot for this `persistence_id`.
    async fn save(&self, persistence_id: &str, sequence_nr: u64, state: &State) -> Result<()>;

    /// Loads the most recent snapshot for `persistence_id`, if any.
    async fn load_latest(&self, persistence_id: &str) -> Result<Option<(u64, State)>>;
}

/// An in-memory [`SnapshotStore`] reference implementation, used by tests and
/// as the crate's only bundled backend.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<String, (u64, State)>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty in-memory snapshot store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, persistence_id: &str, sequence_nr: u64, state: &State) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(persistence_id.to_owned(), (sequence_nr, state.clone()));
        Ok(())
    }

    async fn load_latest(&self, persistence_id: &str) -> Result<Option<(u64, State)>> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.get(persistence_id).cloned())
    }
}
