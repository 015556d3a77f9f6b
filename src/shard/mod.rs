//! The Shard: a per-partition supervisor multiplexing traffic onto on-demand
//! entity workers.
//!
//! A [`Shard`] owns a single mailbox, processed strictly one message at a
//! time by [`Shard::run`] — no internal locking, consistent with the rest of
//! this crate's single-threaded-cooperative-unit model. [`ShardHandle`] is
//! the cheap, cloneable, channel-backed way to address it from outside.

mod dead_letter;
mod messages;
mod registry;

pub use dead_letter::{DeadLetters, LoggingDeadLetters};
pub use messages::{HandOffReply, PassivationHandle};

use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use self::messages::ShardEnvelope;
use self::registry::WorkerRegistry;
use crate::entity::{EntityHandle, EntityProps, EntityRef, HandOffStopperProps};
use crate::error::Error;
use crate::extractor::{EntityMessageExtractor, Extracted};
use crate::id::{EntityId, ShardId};
use crate::message_buffer_map::MessageBufferMap;
use crate::persistence::{self, Event, PersistenceStrategy, State};
use crate::recovery::RecoveryBatch;
use crate::settings::ShardSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Normal,
    HandingOff,
    Stopped,
}

/// Everything a [`Shard`] needs injected at construction; see section 6 of
/// the design for the rationale behind each field.
pub struct ShardConfig<M: Send + 'static> {
    pub type_name: String,
    pub shard_id: ShardId,
    pub settings: ShardSettings,
    pub hand_off_stop_message: M,
    pub entity_props: Arc<dyn EntityProps<M>>,
    pub hand_off_stopper_props: Arc<dyn HandOffStopperProps<M>>,
    pub extractor: Arc<dyn EntityMessageExtractor<M>>,
    pub persistence: Box<dyn PersistenceStrategy<M>>,
    pub dead_letters: Arc<dyn DeadLetters<M>>,
    /// Invoked exactly once, after recovery (immediate for the non-persistent
    /// strategy), with this Shard's id.
    pub on_initialized: Box<dyn FnOnce(ShardId) + Send>,
}

/// A cheap, cloneable, channel-backed handle to a running [`Shard`].
pub struct ShardHandle<M: Send + 'static> {
    sender: UnboundedSender<ShardEnvelope<M>>,
}

impl<M: Send + 'static> Clone for ShardHandle<M> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<M: Send + 'static> ShardHandle<M> {
    /// Routes an application payload through the Shard's extractor.
    pub fn tell(&self, message: M) {
        let _ = self.sender.unbounded_send(ShardEnvelope::Envelope(message));
    }

    /// Requests this Shard begin hand-off, invoking `reply` with
    /// `ShardStopped` once the Shard is done (immediately if it owns no live
    /// entities).
    pub fn hand_off(&self, shard_id: ShardId, reply: HandOffReply) {
        let _ = self.sender.unbounded_send(ShardEnvelope::HandOff { shard_id, reply });
    }

    pub fn restart_entity(&self, id: EntityId) {
        let _ = self.sender.unbounded_send(ShardEnvelope::RestartEntity(id));
    }

    pub fn restart_entities(&self, ids: Vec<EntityId>) {
        let _ = self.sender.unbounded_send(ShardEnvelope::RestartEntities(ids));
    }

    /// Queries the ids currently present in `refById`.
    pub fn current_shard_state(&self) -> oneshot::Receiver<Vec<EntityId>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.unbounded_send(ShardEnvelope::GetCurrentShardState(tx));
        rx
    }

    /// Queries the count of remembered entities.
    pub fn shard_stats(&self) -> oneshot::Receiver<usize> {
        let (tx, rx) = oneshot::channel();
        let _ = self.sender.unbounded_send(ShardEnvelope::GetShardStats(tx));
        rx
    }
}

/// The non-persistent-or-persistent Shard state machine; which it is
/// depends only on the injected [`PersistenceStrategy`].
pub struct Shard<M: Send + 'static> {
    type_name: String,
    shard_id: ShardId,
    settings: ShardSettings,
    hand_off_stop_message: Option<M>,
    entity_props: Arc<dyn EntityProps<M>>,
    hand_off_stopper_props: Arc<dyn HandOffStopperProps<M>>,
    extractor: Arc<dyn EntityMessageExtractor<M>>,
    persistence: Box<dyn PersistenceStrategy<M>>,
    dead_letters: Arc<dyn DeadLetters<M>>,
    on_initialized: Option<Box<dyn FnOnce(ShardId) + Send>>,
    registry: WorkerRegistry<M>,
    buffers: MessageBufferMap<EntityId, M, ()>,
    state: State,
    hand_off_stopper: Option<EntityRef>,
    lifecycle: Lifecycle,
    mailbox: mpsc::UnboundedReceiver<ShardEnvelope<M>>,
    self_sender: UnboundedSender<ShardEnvelope<M>>,
}

impl<M: Send + 'static> Shard<M> {
    /// Builds the Shard and spawns its mailbox loop onto the current Tokio
    /// runtime, returning a handle to address it and the loop's join handle.
    #[must_use]
    pub fn spawn(config: ShardConfig<M>) -> (ShardHandle<M>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded();
        let shard = Shard {
            type_name: config.type_name,
            shard_id: config.shard_id,
            settings: config.settings,
            hand_off_stop_message: Some(config.hand_off_stop_message),
            entity_props: config.entity_props,
            hand_off_stopper_props: config.hand_off_stopper_props,
            extractor: config.extractor,
            persistence: config.persistence,
            dead_letters: config.dead_letters,
            on_initialized: Some(config.on_initialized),
            registry: WorkerRegistry::new(),
            buffers: MessageBufferMap::new(),
            state: State::default(),
            hand_off_stopper: None,
            lifecycle: Lifecycle::Normal,
            mailbox: rx,
            self_sender: tx.clone(),
        };
        let handle = ShardHandle { sender: tx };
        let join = tokio::spawn(shard.run());
        (handle, join)
    }

    #[tracing::instrument(skip(self), fields(shard_id = %self.shard_id, type_name = %self.type_name))]
    async fn run(mut self) {
        self.recover().await;
        while let Some(envelope) = self.mailbox.next().await {
            match envelope {
                ShardEnvelope::Terminated(r) => self.handle_terminated(r).await,
                ShardEnvelope::HandOff { shard_id, reply } => {
                    self.handle_hand_off(shard_id, reply).await;
                },
                ShardEnvelope::RestartEntity(id) => self.handle_restart_entity(id).await,
                ShardEnvelope::RestartEntities(ids) => self.handle_restart_entities(ids).await,
                ShardEnvelope::Passivate(r, m) => self.handle_passivate(r, m),
                ShardEnvelope::GetCurrentShardState(reply) => {
                    let _ = reply.send(self.registry.ids());
                },
                ShardEnvelope::GetShardStats(reply) => {
                    let _ = reply.send(self.state.entities.len());
                },
                ShardEnvelope::Envelope(m) => self.handle_application(m).await,
            }
            if self.lifecycle == Lifecycle::Stopped {
                break;
            }
        }
        tracing::debug!("shard stopped");
    }

    async fn recover(&mut self) {
        match self.persistence.recover().await {
            Ok(recovered) => {
                self.state.entities = recovered.entities;
                for batch in recovered.batches {
                    self.schedule_recovery_batch(batch);
                }
            },
            Err(why) => {
                tracing::error!(error = %why, "recovery failed; starting with no remembered entities");
            },
        }
        if let Some(cb) = self.on_initialized.take() {
            cb(self.shard_id.clone());
        }
    }

    fn schedule_recovery_batch(&self, batch: RecoveryBatch) {
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            if !batch.delay.is_zero() {
                tokio::time::sleep(batch.delay).await;
            }
            let _ = sender.unbounded_send(ShardEnvelope::RestartEntities(batch.ids));
        });
    }

    fn watch(&self, ref_id: EntityRef, termination: JoinHandle<()>) {
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            let _ = termination.await;
            let _ = sender.unbounded_send(ShardEnvelope::Terminated(ref_id));
        });
    }

    /// Looks up `id`'s worker, spawning and registering one on demand.
    ///
    /// The plain variant commits `id` to `state.entities` synchronously here;
    /// the persistent variant only ever admits an id via
    /// `persistence.persist_started`'s replay/apply, so an id that isn't
    /// already remembered is journaled first and the spawn is skipped
    /// entirely on failure, rather than silently granting an un-journaled id
    /// membership that a crash/restart would forget.
    async fn get_entity(&mut self, id: &EntityId) -> Option<EntityRef> {
        if let Some(handle) = self.registry.get_by_id(id) {
            return Some(handle.entity_ref());
        }

        if self.persistence.remembers_entities() {
            if !self.state.entities.contains(id) {
                let before = self.state.clone();
                match self.persistence.persist_started(id, &before).await {
                    Ok(()) => {
                        persistence::apply_event(&mut self.state, &Event::EntityStarted(id.clone()));
                    },
                    Err(why) => {
                        tracing::warn!(entity_id = %id, error = %why, "failed to persist EntityStarted; not spawning");
                        return None;
                    },
                }
            }
        } else {
            self.state.entities.insert(id.clone());
        }

        let ref_id = self.registry.next_ref();
        let passivate = PassivationHandle::new(ref_id, self.self_sender.clone());
        let spawned = self.entity_props.spawn(id, &id.encoded_name(), passivate);
        self.watch(ref_id, spawned.termination);

        let handle = EntityHandle { ref_id, sender: spawned.sender };
        self.registry.insert(id.clone(), handle);
        Some(ref_id)
    }

    fn dead_letter(&self, message: M) {
        self.dead_letters.dead_letter(message, &self.shard_id);
    }

    #[tracing::instrument(skip(self, message))]
    async fn handle_application(&mut self, message: M) {
        if self.lifecycle != Lifecycle::Normal {
            tracing::debug!("hand-off in progress; routing suppressed");
            self.dead_letter(message);
            return;
        }
        match self.extractor.extract(message) {
            Extracted::Entity(id, payload) => self.route_or_buffer(id, payload).await,
            Extracted::NotEntity(message) => {
                tracing::warn!("message not recognized as entity traffic");
                self.dead_letter(message);
            },
        }
    }

    /// The routing algorithm from section 4.3: direct delivery, buffering,
    /// or drop-to-dead-letters, in that priority order.
    async fn route_or_buffer(&mut self, id: EntityId, message: M) {
        if !self.buffers.contains(&id) {
            self.deliver_to(id, message).await;
        } else if self.buffers.total_size() >= self.settings.buffer_size {
            let err = Error::BufferFull { entity_id: id.as_str().to_owned() };
            tracing::debug!(%err);
            self.dead_letter(message);
        } else {
            self.buffers.append(id, message, ());
        }
    }

    async fn deliver_to(&mut self, id: EntityId, message: M) {
        if let Some(handle) = self.registry.get_by_id(&id) {
            let _ = handle.sender.unbounded_send(message);
            return;
        }

        if self.persistence.remembers_entities() {
            self.buffers.append(id.clone(), message, ());
            let before = self.state.clone();
            match self.persistence.persist_started(&id, &before).await {
                Ok(()) => {
                    persistence::apply_event(&mut self.state, &Event::EntityStarted(id.clone()));
                    self.send_msg_buffer(id).await;
                },
                Err(why) => {
                    tracing::warn!(entity_id = %id, error = %why, "failed to persist EntityStarted; leaving buffered for retry");
                },
            }
        } else if self.get_entity(&id).await.is_some() {
            if let Some(handle) = self.registry.get_by_id(&id) {
                let _ = handle.sender.unbounded_send(message);
            }
        }
    }

    /// Closes `id`'s buffering window and re-injects whatever was queued, in
    /// order, through the normal routing algorithm.
    async fn send_msg_buffer(&mut self, id: EntityId) {
        let Some(mut buffer) = self.buffers.remove(&id) else { return };
        if buffer.is_empty() {
            return;
        }
        if self.get_entity(&id).await.is_none() {
            return;
        }
        let pending: Vec<(M, ())> = buffer.drain().collect();
        for (message, ()) in pending {
            self.route_or_buffer(id.clone(), message).await;
        }
    }

    fn handle_passivate(&mut self, ref_id: EntityRef, stop_message: M) {
        let Some(id) = self.registry.get_id(ref_id).cloned() else { return };
        if self.buffers.contains(&id) {
            // Already in a buffering window (passivating or mid-flight
            // spawn); ignore, idempotent.
            return;
        }
        self.buffers.add(id.clone());
        self.registry.mark_passivating(ref_id);
        if let Some(handle) = self.registry.get_by_id(&id) {
            let _ = handle.sender.unbounded_send(stop_message);
        }
    }

    #[tracing::instrument(skip(self))]
    async fn handle_terminated(&mut self, ref_id: EntityRef) {
        if self.hand_off_stopper == Some(ref_id) {
            tracing::debug!("hand-off stopper terminated");
            self.lifecycle = Lifecycle::Stopped;
            return;
        }
        if self.lifecycle == Lifecycle::HandingOff {
            return;
        }
        let Some(id) = self.registry.get_id(ref_id).cloned() else { return };
        let was_passivating = self.registry.unmark_passivating(ref_id);
        // The worker behind `ref_id` is gone; drop it from the registry now
        // so any buffer flush below spawns a fresh one instead of sending
        // into a dead channel.
        self.registry.remove_by_ref(ref_id);

        if !self.buffers.get_or_empty(&id).is_empty() {
            self.send_msg_buffer(id).await;
            return;
        }

        if self.persistence.remembers_entities() && !was_passivating {
            tracing::debug!(entity_id = %id, "unexpected termination; scheduling restart");
            self.schedule_restart(id);
            return;
        }

        self.buffers.remove(&id);
        let before = self.state.clone();
        match self.persistence.persist_stopped(&id, &before).await {
            Ok(()) => persistence::apply_event(&mut self.state, &Event::EntityStopped(id)),
            Err(why) => {
                tracing::warn!(entity_id = %id, error = %why, "failed to persist EntityStopped");
            },
        }
    }

    fn schedule_restart(&self, id: EntityId) {
        let backoff = self.settings.entity_restart_backoff;
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = sender.unbounded_send(ShardEnvelope::RestartEntity(id));
        });
    }

    async fn handle_restart_entity(&mut self, id: EntityId) {
        self.get_entity(&id).await;
    }

    async fn handle_restart_entities(&mut self, ids: Vec<EntityId>) {
        for id in ids {
            self.get_entity(&id).await;
        }
    }

    #[tracing::instrument(skip(self, reply))]
    async fn handle_hand_off(&mut self, shard_id: ShardId, reply: HandOffReply) {
        if self.lifecycle == Lifecycle::HandingOff {
            tracing::warn!(err = %Error::HandOffInProgress);
            return;
        }
        if shard_id != self.shard_id {
            let err = Error::ForeignShard {
                requested: shard_id.as_str().to_owned(),
                owned: self.shard_id.as_str().to_owned(),
            };
            tracing::warn!(%err);
            return;
        }

        let entities = self.registry.ids();
        if entities.is_empty() {
            reply(self.shard_id.clone());
            self.lifecycle = Lifecycle::Stopped;
            return;
        }

        let Some(stop_message) = self.hand_off_stop_message.take() else {
            tracing::error!("hand-off stop message already consumed");
            return;
        };

        let ref_id = self.registry.next_ref();
        let stopper = self.hand_off_stopper_props.spawn(
            self.shard_id.clone(),
            entities,
            stop_message,
            reply,
        );
        self.watch(ref_id, stopper);
        self.hand_off_stopper = Some(ref_id);
        self.lifecycle = Lifecycle::HandingOff;
    }
}
