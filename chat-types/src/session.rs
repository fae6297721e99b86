//! Session records and read marks.

use crate::ids::{ParticipantId, SessionId, Timestamp};
use crate::records::Participant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-participant "read up to" timestamps on a session.
///
/// One entry per participant, growing monotonically in time: a later
/// mark must never be overwritten by an earlier one. The raw [`set`]
/// accessor does not enforce this — the store's server clock and the
/// engine's merge logic do.
///
/// [`set`]: ReadMarks::set
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadMarks(BTreeMap<ParticipantId, Timestamp>);

impl ReadMarks {
    /// Create an empty read-mark map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a participant's mark, if present.
    pub fn get(&self, participant: &ParticipantId) -> Option<Timestamp> {
        self.0.get(participant).copied()
    }

    /// Set a participant's mark unconditionally.
    ///
    /// Used by the store when applying a server-stamped write; callers
    /// merging observed marks into a local view should use
    /// `chat_core::observe_mark` instead, which never moves a mark
    /// backward.
    pub fn set(&mut self, participant: ParticipantId, at: Timestamp) {
        self.0.insert(participant, at);
    }

    /// Iterate over all marks.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, Timestamp)> {
        self.0.iter().map(|(id, ts)| (id, *ts))
    }

    /// Number of participants with a mark.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no participant has a mark yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A persistent chat session.
///
/// Created once per distinct canonical participant set; never deleted by
/// the engine. `participant_ids` is immutable after creation and holds
/// the canonical (ascending, deduplicated) ordering. `participants` is a
/// cached directory resolution refreshed on session open. `read_marks`
/// is the only field mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Store-assigned session id.
    pub id: SessionId,
    /// Canonically ordered participant ids.
    pub participant_ids: Vec<ParticipantId>,
    /// Resolved participant records.
    pub participants: Vec<Participant>,
    /// Per-participant read marks.
    #[serde(default)]
    pub read_marks: ReadMarks,
}

impl Session {
    /// Whether the given participant belongs to this session.
    pub fn has_participant(&self, id: &ParticipantId) -> bool {
        self.participant_ids.iter().any(|p| p == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_marks_start_empty() {
        let marks = ReadMarks::new();
        assert!(marks.is_empty());
        assert_eq!(marks.get(&ParticipantId::new("u1")), None);
    }

    #[test]
    fn read_marks_set_and_get() {
        let mut marks = ReadMarks::new();
        marks.set(ParticipantId::new("u1"), Timestamp::from_millis(100));

        assert_eq!(marks.len(), 1);
        assert_eq!(
            marks.get(&ParticipantId::new("u1")),
            Some(Timestamp::from_millis(100))
        );
    }

    #[test]
    fn read_marks_serialize_as_field_map() {
        let mut marks = ReadMarks::new();
        marks.set(ParticipantId::new("u2"), Timestamp::from_millis(42));

        let doc = serde_json::to_value(&marks).unwrap();
        assert_eq!(doc, serde_json::json!({ "u2": 42 }));
    }

    #[test]
    fn session_document_shape() {
        let session = Session {
            id: SessionId::new(),
            participant_ids: vec![ParticipantId::new("u1"), ParticipantId::new("u2")],
            participants: vec![
                Participant::new("u1", "Alice", "alice@example.com"),
                Participant::new("u2", "Bob", "bob@example.com"),
            ],
            read_marks: ReadMarks::new(),
        };

        let doc = serde_json::to_value(&session).unwrap();
        assert_eq!(doc["participantIds"], serde_json::json!(["u1", "u2"]));
        assert_eq!(doc["readMarks"], serde_json::json!({}));

        let restored: Session = serde_json::from_value(doc).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn session_missing_read_marks_defaults_empty() {
        // Documents written before any mark-read have no readMarks field.
        let doc = serde_json::json!({
            "id": SessionId::new(),
            "participantIds": ["u1", "u2"],
            "participants": [
                { "id": "u1", "displayName": "Alice", "email": "a@x.com" },
                { "id": "u2", "displayName": "Bob", "email": "b@x.com" },
            ],
        });
        let session: Session = serde_json::from_value(doc).unwrap();
        assert!(session.read_marks.is_empty());
    }

    #[test]
    fn has_participant() {
        let session = Session {
            id: SessionId::new(),
            participant_ids: vec![ParticipantId::new("u1"), ParticipantId::new("u2")],
            participants: vec![],
            read_marks: ReadMarks::new(),
        };
        assert!(session.has_participant(&ParticipantId::new("u1")));
        assert!(!session.has_participant(&ParticipantId::new("u9")));
    }
}
