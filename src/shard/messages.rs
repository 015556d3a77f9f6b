use futures::channel::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::entity::EntityRef;
use crate::id::{EntityId, ShardId};

/// Invoked exactly once, either immediately (hand-off of an empty Shard) or
/// by the hand-off stopper once every entity has confirmed termination.
pub type HandOffReply = Box<dyn FnOnce(ShardId) + Send>;

/// The Shard's single mailbox type: every inbound family from section 4.3 of
/// the design, plus the routed application payload.
pub(crate) enum ShardEnvelope<M> {
    Terminated(EntityRef),
    HandOff { shard_id: ShardId, reply: HandOffReply },
    RestartEntity(EntityId),
    RestartEntities(Vec<EntityId>),
    Passivate(EntityRef, M),
    GetCurrentShardState(oneshot::Sender<Vec<EntityId>>),
    GetShardStats(oneshot::Sender<usize>),
    Envelope(M),
}

/// Given to an entity worker at spawn time so it can request passivation
/// without needing to know its own `EntityRef` — the handle already has it
/// bound.
///
/// Playing the role of the "sender" an actor runtime would supply
/// automatically, this is the one piece of that runtime this crate has to
/// stand in for: a worker has no other way to address the Shard that owns
/// it.
pub struct PassivationHandle<M> {
    ref_id: EntityRef,
    shard: UnboundedSender<ShardEnvelope<M>>,
}

impl<M> PassivationHandle<M> {
    pub(crate) fn new(ref_id: EntityRef, shard: UnboundedSender<ShardEnvelope<M>>) -> Self {
        Self { ref_id, shard }
    }

    /// Requests passivation, round-tripping `stop_message` back to this
    /// worker once the Shard has opened the buffering window for it.
    pub fn request(&self, stop_message: M) {
        let _ = self.shard.unbounded_send(ShardEnvelope::Passivate(self.ref_id, stop_message));
    }
}

impl<M> Clone for PassivationHandle<M> {
    fn clone(&self) -> Self {
        Self { ref_id: self.ref_id, shard: self.shard.clone() }
    }
}
