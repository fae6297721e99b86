//! Canonical, order-independent identity for a participant set.

use chat_types::{ChatError, ParticipantId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical identity of a participant set.
///
/// Participant ids are sorted ascending by byte-wise comparison and
/// deduplicated, so two set-equal inputs always normalize to the
/// identical sequence. Session lookup relies on this: the store only
/// offers exact sequence equality, and canonicalization makes sequence
/// equality sufficient for set equality.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatKey(Vec<ParticipantId>);

impl ChatKey {
    /// Canonicalize a participant set.
    ///
    /// Accepts any order and tolerates duplicates. Rejects an empty
    /// input with [`ChatError::InvalidArgument`]; that is the only
    /// failure mode.
    pub fn new<I>(ids: I) -> Result<Self, ChatError>
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let mut ids: Vec<ParticipantId> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(ChatError::InvalidArgument(
                "participant set must not be empty".to_string(),
            ));
        }
        ids.sort();
        ids.dedup();
        Ok(Self(ids))
    }

    /// The canonical id sequence.
    pub fn as_slice(&self) -> &[ParticipantId] {
        &self.0
    }

    /// Number of distinct participants.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty. Always false for a constructed key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the given participant is part of the key.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.0.binary_search(id).is_ok()
    }

    /// Consume the key, yielding the canonical sequence.
    pub fn into_vec(self) -> Vec<ParticipantId> {
        self.0
    }
}

impl fmt::Debug for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatKey(")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, ")")
    }
}
