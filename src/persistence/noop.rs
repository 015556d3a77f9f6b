use std::collections::HashSet;

use async_trait::async_trait;

use super::{PersistenceStrategy, Recovered, State};
use crate::error::Result;
use crate::id::EntityId;

/// The no-op [`PersistenceStrategy`]: realizes the plain (non-remembering)
/// Shard.
///
/// `recover` always reports an empty remembered set with no restart batches,
/// and the `persist_*` hooks never touch a journal, so they resolve
/// immediately.
#[derive(Debug, Default)]
pub struct NoopPersistence;

impl NoopPersistence {
    /// Creates a `NoopPersistence` strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<M: Send + 'static> PersistenceStrategy<M> for NoopPersistence {
    fn remembers_entities(&self) -> bool {
        false
    }

    async fn recover(&mut self) -> Result<Recovered> {
        Ok(Recovered { entities: HashSet::new(), batches: Vec::new() })
    }

    async fn persist_started(&mut self, _id: &EntityId, _current_state: &State) -> Result<()> {
        Ok(())
    }

    async fn persist_stopped(&mut self, _id: &EntityId, _current_state: &State) -> Result<()> {
        Ok(())
    }
}
