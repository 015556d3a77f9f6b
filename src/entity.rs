use futures::channel::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::id::{EntityId, ShardId};
use crate::shard::PassivationHandle;

/// An opaque handle identifying a spawned worker.
///
/// Plays the role of the "worker-handle" in the spec's `idByRef`/`refById`
/// registries: cheap to copy, compared by identity only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef(u64);

impl EntityRef {
    pub(crate) fn new(n: u64) -> Self {
        Self(n)
    }
}

/// What spawning an entity worker produces: a sender to forward application
/// payloads to it, and the task handle the Shard watches for termination.
pub struct SpawnedEntity<M> {
    /// Forwards payloads to the running worker.
    pub sender: UnboundedSender<M>,
    /// Resolves (successfully or not) when the worker stops, for any reason.
    pub termination: JoinHandle<()>,
}

/// A template for spawning an application-defined entity worker.
///
/// The worker's own message-handling logic is out of scope for this crate;
/// only the means of spawning it and addressing it are.
pub trait EntityProps<M: Send + 'static>: Send + Sync {
    /// Spawns a new worker responsible for `id`. `name` is `id`'s
    /// percent-encoded form ([`EntityId::encoded_name`]), safe to hand to a
    /// backend that names its tasks/threads/actors and would otherwise choke
    /// on raw application ids. `passivate` lets the worker ask the Shard to
    /// begin passivating it without the worker needing to know its own
    /// `EntityRef`.
    fn spawn(&self, id: &EntityId, name: &str, passivate: PassivationHandle<M>) -> SpawnedEntity<M>;
}

/// A template for spawning the per-shard hand-off stopper.
///
/// The stopper drains and stops the named entities, then terminates; the
/// Shard only observes that termination (see
/// [`crate::shard::Shard`]'s hand-off protocol).
pub trait HandOffStopperProps<M: Send + 'static>: Send + Sync {
    /// Spawns the stopper for `shard_id`, responsible for draining
    /// `entities` with `stop_message` and reporting `shard_stopped` once
    /// every entity has confirmed termination.
    fn spawn(
        &self,
        shard_id: ShardId,
        entities: Vec<EntityId>,
        stop_message: M,
        shard_stopped: Box<dyn FnOnce(ShardId) + Send>,
    ) -> JoinHandle<()>;
}

/// A handle to a single tracked worker: its forwarding sender plus the
/// opaque ref used as the registry key.
#[derive(Clone)]
pub struct EntityHandle<M> {
    pub(crate) ref_id: EntityRef,
    pub(crate) sender: UnboundedSender<M>,
}

impl<M> EntityHandle<M> {
    /// The opaque ref identifying this worker.
    #[must_use]
    pub fn entity_ref(&self) -> EntityRef {
        self.ref_id
    }
}
