//! Shardkeeper is a per-partition entity-sharding supervisor.
//!
//! A sharding layer routes messages addressed to an application-defined
//! entity identity to one cluster member, where a [`Shard`](shard::Shard)
//! owns that identity's worker, its mailbox during transitions, and its
//! lifecycle.
//!
//! The [`Shard`](shard::Shard) lazily spawns, supervises, and terminates
//! entity workers keyed by application identity; buffers in-flight traffic
//! across passivation/restart windows without reordering or unbounded
//! growth; and coordinates a cooperative hand-off protocol with an external
//! coordinator so ownership can migrate between cluster nodes.
//!
//! Optionally, a [`JournaledPersistence`](persistence::JournaledPersistence)
//! strategy persists the set of live entity identities to a write-ahead
//! journal so entity membership survives process restarts and migrations
//! (the "remember entities" mode).
#![deny(rust_2018_idioms)]
#![deny(clippy::unwrap_used)]

mod entity;
mod error;
mod extractor;
mod id;
mod message_buffer;
mod message_buffer_map;
pub mod persistence;
mod recovery;
mod settings;
pub mod shard;

pub mod prelude;

pub use crate::entity::{EntityHandle, EntityProps, EntityRef, HandOffStopperProps, SpawnedEntity};
pub use crate::error::{Error, Result};
pub use crate::extractor::{EntityMessageExtractor, Extracted};
pub use crate::id::{EntityId, ShardId};
pub use crate::message_buffer::MessageBuffer;
pub use crate::message_buffer_map::MessageBufferMap;
pub use crate::recovery::{AllAtOnce, ConstantRate, EntityRecoveryStrategy, RecoveryBatch};
pub use crate::settings::{RecoveryStrategyKind, ShardSettings};
pub use crate::shard::{
    DeadLetters, HandOffReply, LoggingDeadLetters, PassivationHandle, Shard, ShardConfig,
    ShardHandle,
};
