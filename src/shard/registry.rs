use std::collections::{HashMap, HashSet};

use crate::entity::{EntityHandle, EntityRef};
use crate::id::EntityId;

/// The Shard's worker registry: the `idByRef`/`refById` bijection plus the
/// `passivating` subset.
///
/// Owned exclusively by the Shard's single mailbox loop; never shared or
/// locked.
pub(crate) struct WorkerRegistry<M> {
    next_ref: u64,
    id_by_ref: HashMap<EntityRef, EntityId>,
    ref_by_id: HashMap<EntityId, EntityHandle<M>>,
    passivating: HashSet<EntityRef>,
}

impl<M> WorkerRegistry<M> {
    pub(crate) fn new() -> Self {
        Self {
            next_ref: 0,
            id_by_ref: HashMap::new(),
            ref_by_id: HashMap::new(),
            passivating: HashSet::new(),
        }
    }

    /// Allocates a fresh, never-before-used `EntityRef`.
    pub(crate) fn next_ref(&mut self) -> EntityRef {
        let r = EntityRef::new(self.next_ref);
        self.next_ref += 1;
        r
    }

    pub(crate) fn insert(&mut self, id: EntityId, handle: EntityHandle<M>) {
        self.id_by_ref.insert(handle.entity_ref(), id.clone());
        self.ref_by_id.insert(id, handle);
    }

    pub(crate) fn get_by_id(&self, id: &EntityId) -> Option<&EntityHandle<M>> {
        self.ref_by_id.get(id)
    }

    pub(crate) fn get_id(&self, r: EntityRef) -> Option<&EntityId> {
        self.id_by_ref.get(&r)
    }

    pub(crate) fn contains_id(&self, id: &EntityId) -> bool {
        self.ref_by_id.contains_key(id)
    }

    /// Removes both directions of the bijection for `r`, and drops any
    /// `passivating` membership. Returns the removed id, if `r` was known.
    pub(crate) fn remove_by_ref(&mut self, r: EntityRef) -> Option<EntityId> {
        self.passivating.remove(&r);
        let id = self.id_by_ref.remove(&r)?;
        self.ref_by_id.remove(&id);
        Some(id)
    }

    pub(crate) fn mark_passivating(&mut self, r: EntityRef) {
        self.passivating.insert(r);
    }

    /// Drops `r` from `passivating`; idempotent if it was not a member.
    pub(crate) fn unmark_passivating(&mut self, r: EntityRef) -> bool {
        self.passivating.remove(&r)
    }

    pub(crate) fn is_passivating(&self, r: EntityRef) -> bool {
        self.passivating.contains(&r)
    }

    /// The ids currently present in `refById`, in arbitrary (hash) order —
    /// used both for `GetCurrentShardState` and to enumerate entities at
    /// hand-off time.
    pub(crate) fn ids(&self) -> Vec<EntityId> {
        self.ref_by_id.keys().cloned().collect()
    }
}
