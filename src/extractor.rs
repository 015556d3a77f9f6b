use crate::id::EntityId;

/// The outcome of classifying an inbound application message.
pub enum Extracted<M> {
    /// The message is application traffic addressed to `id`.
    Entity(EntityId, M),
    /// The extractor does not recognize this message as application traffic
    /// (it is not a routable entity message, e.g. it is malformed or
    /// addressed via an unrecognized envelope).
    NotEntity(M),
}

/// Classifies an opaque application message into `(entity id, payload)`.
///
/// This is a partial function: only messages the extractor recognizes are
/// treated as application traffic bound for an entity. The Shard forwards
/// everything else to the dead-letter sink (or, for messages it does
/// recognize but which carry an empty id, logs and drops them — see
/// [`crate::shard::Shard`]'s routing algorithm).
pub trait EntityMessageExtractor<M>: Send + Sync {
    /// Attempts to classify `message`.
    fn extract(&self, message: M) -> Extracted<M>;
}

/// An `EntityMessageExtractor` built from a plain function, for callers who
/// don't need a full trait impl.
impl<M, F> EntityMessageExtractor<M> for F
where
    F: Fn(M) -> Extracted<M> + Send + Sync,
{
    fn extract(&self, message: M) -> Extracted<M> {
        self(message)
    }
}
