//! A set of exports which can be helpful to use.
//!
//! These are not re-exported at the crate root so that embedding
//! applications can opt into the full surface with a single `use`.
//!
//! # Examples
//!
//! ```
//! use shardkeeper::prelude::*;
//! ```

pub use crate::entity::{EntityHandle, EntityProps, EntityRef, HandOffStopperProps, SpawnedEntity};
pub use crate::error::{Error, Result};
pub use crate::extractor::{EntityMessageExtractor, Extracted};
pub use crate::id::{EntityId, ShardId};
pub use crate::persistence::{
    Event, InMemoryJournal, InMemorySnapshotStore, Journal, JournaledPersistence,
    JournaledPersistenceConfig, NoopPersistence, PersistenceStrategy, Recovered, SnapshotStore,
    State,
};
pub use crate::recovery::{AllAtOnce, ConstantRate, EntityRecoveryStrategy, RecoveryBatch};
pub use crate::settings::{RecoveryStrategyKind, ShardSettings};
pub use crate::shard::{
    DeadLetters, HandOffReply, LoggingDeadLetters, PassivationHandle, Shard, ShardConfig,
    ShardHandle,
};
