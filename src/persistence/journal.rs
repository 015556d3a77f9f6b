use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Event;
use crate::error::Result;

/// An append-only event log keyed by persistence id.
///
/// Backends beyond the bundled in-memory reference implementation are an
/// embedder's responsibility to provide (e.g. backed by a database); this
/// crate only needs the interface.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends `event` at `sequence_nr`, returning once the write is
    /// durable (or at least acknowledged by the backend).
    async fn append(&self, persistence_id: &str, sequence_nr: u64, event: &Event) -> Result<()>;

    /// Replays every event for `persistence_id` with sequence number
    /// greater than `from_seq`, in ascending sequence order.
    async fn replay(&self, persistence_id: &str, from_seq: u64) -> Result<Vec<(u64, Event)>>;
}

/// An in-memory [`Journal`] reference implementation, used by tests and as
/// the crate's only bundled backend.
#[derive(Default)]
pub struct InMemoryJournal {
    events: Mutex<HashMap<String, Vec<(u64, Event)>>>,
}

impl InMemoryJournal {
    /// Creates an empty in-memory journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, persistence_id: &str, sequence_nr: u64, event: &Event) -> Result<()> {
        let mut events = self.events.lock().await;
        events.entry(persistence_id.to_owned()).or_default().push((sequence_nr, event.clone()));
        Ok(())
    }

    async fn replay(&self, persistence_id: &str, from_seq: u64) -> Result<Vec<(u64, Event)>> {
        let events = self.events.lock().await;
        Ok(events
            .get(persistence_id)
            .map(|log| log.iter().filter(|(seq, _)| *seq > from_seq).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityId;

    #[tokio::test]
    async fn replay_returns_events_in_order_after_cutoff() {
        let journal = InMemoryJournal::new();
        let x = EntityId::new("x").unwrap();

        journal.append("/p/1", 1, &Event::EntityStarted(x.clone())).await.unwrap();
        journal.append("/p/1", 2, &Event::EntityStopped(x.clone())).await.unwrap();
        journal.append("/p/1", 3, &Event::EntityStarted(x.clone())).await.unwrap();

        let all = journal.replay("/p/1", 0).await.unwrap();
        assert_eq!(all.len(), 3);

        let after_first = journal.replay("/p/1", 1).await.unwrap();
        assert_eq!(after_first.len(), 2);
        assert_eq!(after_first[0].0, 2);
    }

    #[tokio::test]
    async fn replay_of_unknown_persistence_id_is_empty() {
        let journal = InMemoryJournal::new();
        assert!(journal.replay("/missing", 0).await.unwrap().is_empty());
    }
}
