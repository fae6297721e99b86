//! The Local Message Log.
//!
//! An in-memory, deduplicated projection of all messages observed for a
//! session so far. The log is a fold over subscription deliveries: each
//! batch merges in by id, so duplicate delivery is idempotent and an
//! optimistic local echo converges with its authoritative streamed copy.
//!
//! Ordering is newest-first (created-at descending) with the message id
//! as a deterministic tiebreak. Arrival order is not assumed to equal
//! creation order, so the log re-sorts on every merge that changes it.

use chat_types::{Message, MessageId};

/// Deduplicated, newest-first log of a session's messages.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    /// Sorted created-at descending, id ascending on ties.
    messages: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of observed messages into the log.
    ///
    /// An id already present is replaced, never duplicated; new ids are
    /// inserted. Returns true if the log changed. Merging the same batch
    /// twice is a no-op the second time.
    pub fn merge<I>(&mut self, batch: I) -> bool
    where
        I: IntoIterator<Item = Message>,
    {
        let mut changed = false;
        for incoming in batch {
            match self.messages.iter().position(|m| m.id == incoming.id) {
                Some(pos) => {
                    if self.messages[pos] != incoming {
                        self.messages[pos] = incoming;
                        changed = true;
                    }
                }
                None => {
                    self.messages.push(incoming);
                    changed = true;
                }
            }
        }
        if changed {
            self.messages.sort_unstable_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
            });
        }
        changed
    }

    /// The messages, newest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently created message, if any.
    pub fn newest(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Look up a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == *id)
    }

    /// Whether a message with the given id has been observed.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Number of distinct messages observed.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages have been observed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
