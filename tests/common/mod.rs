//! Shared test doubles for the end-to-end Shard scenarios.
//!
//! `Msg` plays the role of the single application message type every Shard
//! in these tests is generic over: every variant carries the entity id it is
//! addressed to, so one [`TestExtractor`] suffices for all of them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;
use shardkeeper::prelude::*;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum Msg {
    /// Application payload addressed to an entity.
    Value(String, i32),
    /// Sent to an entity to ask it to request its own passivation.
    RequestPassivate(String),
    /// The stop message round-tripped back to a passivating entity.
    StopNow(String),
}

impl Msg {
    fn entity_id(&self) -> &str {
        match self {
            Msg::Value(id, _) | Msg::RequestPassivate(id) | Msg::StopNow(id) => id,
        }
    }
}

pub struct TestExtractor;

impl EntityMessageExtractor<Msg> for TestExtractor {
    fn extract(&self, message: Msg) -> Extracted<Msg> {
        match EntityId::new(message.entity_id()) {
            Ok(id) => Extracted::Entity(id, message),
            Err(_) => Extracted::NotEntity(message),
        }
    }
}

/// Records every payload a spawned worker has received, tagged by the
/// worker's own id, in delivery order.
#[derive(Clone, Default)]
pub struct DeliveryLog {
    deliveries: Arc<Mutex<Vec<(String, i32)>>>,
    spawn_count: Arc<Mutex<HashMap<String, u32>>>,
}

impl DeliveryLog {
    pub fn deliveries_for(&self, id: &str) -> Vec<i32> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(eid, _)| eid == id)
            .map(|(_, payload)| *payload)
            .collect()
    }

    pub fn spawn_count(&self, id: &str) -> u32 {
        *self.spawn_count.lock().unwrap().get(id).unwrap_or(&0)
    }
}

/// An [`EntityProps`] double whose workers echo every `Value` into a shared
/// [`DeliveryLog`] and honor the passivation round trip.
#[derive(Clone)]
pub struct EchoEntityProps {
    pub log: DeliveryLog,
}

impl EntityProps<Msg> for EchoEntityProps {
    fn spawn(&self, id: &EntityId, _name: &str, passivate: PassivationHandle<Msg>) -> SpawnedEntity<Msg> {
        let (tx, mut rx) = mpsc::unbounded();
        let log = self.log.clone();
        let id = id.as_str().to_owned();

        *log.spawn_count.lock().unwrap().entry(id.clone()).or_insert(0) += 1;

        let termination = tokio::spawn(async move {
            while let Some(message) = rx.next().await {
                match message {
                    Msg::Value(_, payload) => {
                        log.deliveries.lock().unwrap().push((id.clone(), payload));
                    },
                    Msg::RequestPassivate(eid) => {
                        passivate.request(Msg::StopNow(eid));
                    },
                    Msg::StopNow(_) => {
                        // Simulates a worker that takes some time to wind
                        // down after being told to stop, so tests can
                        // observe the buffering window while it is open.
                        tokio::time::sleep(Duration::from_millis(120)).await;
                        break;
                    },
                }
            }
        });

        SpawnedEntity { sender: tx, termination }
    }
}

/// A [`HandOffStopperProps`] double that reports completion shortly after
/// being spawned, without itself driving entity shutdown — the spec treats
/// that coordination as an external-runtime concern.
pub struct ImmediateHandOffStopper;

impl HandOffStopperProps<Msg> for ImmediateHandOffStopper {
    fn spawn(
        &self,
        shard_id: ShardId,
        _entities: Vec<EntityId>,
        _stop_message: Msg,
        shard_stopped: Box<dyn FnOnce(ShardId) + Send>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            shard_stopped(shard_id);
        })
    }
}

pub fn plain_settings(buffer_size: usize) -> ShardSettings {
    ShardSettings { buffer_size, ..ShardSettings::default() }
}
