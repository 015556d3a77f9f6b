use crate::id::ShardId;

/// Where messages the Shard cannot (or will not) route end up: an empty
/// routing key, or an append that would exceed `bufferSize`.
///
/// The dead-letter sink itself is an actor-runtime collaborator out of this
/// crate's scope (section 1); this trait is the seam an embedder plugs its
/// own into.
pub trait DeadLetters<M>: Send + Sync {
    fn dead_letter(&self, message: M, shard_id: &ShardId);
}

/// A [`DeadLetters`] sink that only logs, for embedders with no dead-letter
/// infrastructure of their own.
#[derive(Debug, Default)]
pub struct LoggingDeadLetters;

impl<M> DeadLetters<M> for LoggingDeadLetters {
    fn dead_letter(&self, _message: M, shard_id: &ShardId) {
        tracing::debug!(shard_id = %shard_id, "dropped message to dead letters");
    }
}
