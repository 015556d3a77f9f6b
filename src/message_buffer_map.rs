use std::collections::HashMap;
use std::hash::Hash;

use crate::message_buffer::MessageBuffer;

/// A mapping from entity id to [`MessageBuffer`].
///
/// The presence of a key — even with an empty buffer — is the semantic flag
/// that marks an id as "currently in a buffering window": messages for that
/// id are queued here instead of delivered directly.
#[derive(Debug)]
pub struct MessageBufferMap<Id, M, S> {
    buffers: HashMap<Id, MessageBuffer<M, S>>,
}

impl<Id: Eq + Hash, M, S> MessageBufferMap<Id, M, S> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self { buffers: HashMap::new() }
    }

    /// Marks `id` as in a buffering window without enqueuing anything.
    ///
    /// After this call, `contains(id)` is `true` even though no message has
    /// arrived for it yet.
    pub fn add(&mut self, id: Id) {
        self.buffers.entry(id).or_default();
    }

    /// Whether `id` is currently marked as in a buffering window.
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.buffers.contains_key(id)
    }

    /// Appends `(message, sender)` to `id`'s buffer, lazily creating it.
    ///
    /// After this call, `contains(id)` is `true` and the buffer is
    /// non-empty.
    pub fn append(&mut self, id: Id, message: M, sender: S) {
        self.buffers.entry(id).or_default().append(message, sender);
    }

    /// Removes `id`'s entry entirely, discarding any unread pairs.
    ///
    /// Returns the removed buffer, if any, so callers can flush it.
    pub fn remove(&mut self, id: &Id) -> Option<MessageBuffer<M, S>> {
        self.buffers.remove(id)
    }

    /// Returns `id`'s buffer if present, otherwise a transient empty buffer.
    ///
    /// Never creates an entry as a side effect — use this to test emptiness
    /// without materializing a buffering-window flag.
    #[must_use]
    pub fn get_or_empty(&self, id: &Id) -> MessageBufferView<'_, M, S> {
        match self.buffers.get(id) {
            Some(buf) => MessageBufferView::Borrowed(buf),
            None => MessageBufferView::Empty,
        }
    }

    /// The sum of every buffer's size, used to cap total in-flight buffered
    /// messages per Shard.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.buffers.values().map(MessageBuffer::len).sum()
    }
}

impl<Id: Eq + Hash, M, S> Default for MessageBufferMap<Id, M, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A borrowed view returned by [`MessageBufferMap::get_or_empty`].
pub enum MessageBufferView<'a, M, S> {
    Borrowed(&'a MessageBuffer<M, S>),
    Empty,
}

impl<'a, M, S> MessageBufferView<'a, M, S> {
    /// Whether the viewed buffer (real or transient) holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            MessageBufferView::Borrowed(buf) => buf.is_empty(),
            MessageBufferView::Empty => true,
        }
    }

    /// The viewed buffer's length (zero for the transient empty view).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MessageBufferView::Borrowed(buf) => buf.len(),
            MessageBufferView::Empty => 0,
        }
    }
}
