//! Read-mark merging and unread-count computation.
//!
//! Read marks arrive through a subscription that is independent of the
//! message stream; the two views are composed here, not coupled. All
//! functions are pure and recomputed on demand - the unread count is a
//! derivation, never stored state.

use crate::log::MessageLog;
use chat_types::{Message, ParticipantId, ReadMarks, Timestamp};

/// Advance a participant's read mark, never moving it backward.
///
/// Returns true if the mark advanced. A mark equal to or earlier than
/// the current one is ignored; per-participant marks grow monotonically
/// in time.
pub fn observe_mark(marks: &mut ReadMarks, participant: &ParticipantId, at: Timestamp) -> bool {
    match marks.get(participant) {
        Some(current) if current >= at => false,
        _ => {
            marks.set(participant.clone(), at);
            true
        }
    }
}

/// Merge an observed read-mark snapshot into the local view.
///
/// Each entry advances independently via [`observe_mark`], so a stale
/// snapshot delivered late can never move any mark backward. Returns
/// true if any mark advanced.
pub fn merge_marks(current: &mut ReadMarks, incoming: &ReadMarks) -> bool {
    let mut changed = false;
    for (participant, at) in incoming.iter() {
        changed |= observe_mark(current, participant, at);
    }
    changed
}

/// Number of participants who have not yet read the given message.
///
/// Counts participants other than the sender whose mark is absent or
/// strictly earlier than the message's commit timestamp. A mark exactly
/// at the commit timestamp counts as read.
pub fn unread_count(message: &Message, participants: &[ParticipantId], marks: &ReadMarks) -> usize {
    participants
        .iter()
        .filter(|p| **p != message.sender.id)
        .filter(|p| match marks.get(p) {
            None => true,
            Some(mark) => mark < message.created_at,
        })
        .count()
}

/// Whether the reader's view contains anything newer than their mark.
///
/// The store offers only last-write-wins on read marks, so the engine
/// issues a mark-read write only when this returns true. Messages sent
/// by the reader never require a mark.
pub fn needs_read_mark(log: &MessageLog, marks: &ReadMarks, reader: &ParticipantId) -> bool {
    let mark = marks.get(reader);
    log.messages()
        .iter()
        .filter(|m| m.sender.id != *reader)
        .any(|m| match mark {
            None => true,
            Some(mark) => m.created_at > mark,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{MessageId, MessagePayload, Participant};

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    fn msg_from(sender: &str, at: i64) -> Message {
        Message {
            id: MessageId::new(),
            sender: Participant::new(sender, sender.to_uppercase(), format!("{}@x.com", sender)),
            payload: MessagePayload::text("hi"),
            created_at: Timestamp::from_millis(at),
        }
    }

    #[test]
    fn observe_mark_advances() {
        let mut marks = ReadMarks::new();
        assert!(observe_mark(&mut marks, &pid("u1"), Timestamp::from_millis(10)));
        assert_eq!(marks.get(&pid("u1")), Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn observe_mark_never_moves_backward() {
        let mut marks = ReadMarks::new();
        observe_mark(&mut marks, &pid("u1"), Timestamp::from_millis(100));

        assert!(!observe_mark(&mut marks, &pid("u1"), Timestamp::from_millis(50)));
        assert!(!observe_mark(&mut marks, &pid("u1"), Timestamp::from_millis(100)));
        assert_eq!(marks.get(&pid("u1")), Some(Timestamp::from_millis(100)));
    }

    #[test]
    fn stale_snapshot_cannot_regress_any_mark() {
        let mut current = ReadMarks::new();
        current.set(pid("u1"), Timestamp::from_millis(100));
        current.set(pid("u2"), Timestamp::from_millis(30));

        // Late-arriving snapshot: older for u1, newer for u2, new for u3.
        let mut incoming = ReadMarks::new();
        incoming.set(pid("u1"), Timestamp::from_millis(40));
        incoming.set(pid("u2"), Timestamp::from_millis(60));
        incoming.set(pid("u3"), Timestamp::from_millis(10));

        assert!(merge_marks(&mut current, &incoming));
        assert_eq!(current.get(&pid("u1")), Some(Timestamp::from_millis(100)));
        assert_eq!(current.get(&pid("u2")), Some(Timestamp::from_millis(60)));
        assert_eq!(current.get(&pid("u3")), Some(Timestamp::from_millis(10)));
    }

    #[test]
    fn unread_excludes_sender_and_counts_absent_marks() {
        // A sends at t=50 to {A,B,C}; B read at 60, C never read.
        let participants = vec![pid("a"), pid("b"), pid("c")];
        let message = msg_from("a", 50);

        let mut marks = ReadMarks::new();
        marks.set(pid("b"), Timestamp::from_millis(60));

        assert_eq!(unread_count(&message, &participants, &marks), 1);
    }

    #[test]
    fn mark_boundaries_are_strict() {
        // u2 marked read at T; a message at T-1 contributes 0, at T+1
        // contributes 1, and exactly T counts as read.
        let participants = vec![pid("u1"), pid("u2")];
        let mut marks = ReadMarks::new();
        marks.set(pid("u2"), Timestamp::from_millis(1000));

        let before = msg_from("u1", 999);
        let at = msg_from("u1", 1000);
        let after = msg_from("u1", 1001);

        assert_eq!(unread_count(&before, &participants, &marks), 0);
        assert_eq!(unread_count(&at, &participants, &marks), 0);
        assert_eq!(unread_count(&after, &participants, &marks), 1);
    }

    #[test]
    fn everyone_unread_when_no_marks() {
        let participants = vec![pid("a"), pid("b"), pid("c"), pid("d")];
        let message = msg_from("a", 10);
        assert_eq!(unread_count(&message, &participants, &ReadMarks::new()), 3);
    }

    #[test]
    fn needs_mark_when_foreign_message_is_newer() {
        let mut log = MessageLog::new();
        log.merge(vec![msg_from("u1", 100)]);

        let mut marks = ReadMarks::new();
        assert!(needs_read_mark(&log, &marks, &pid("u2")), "no mark yet");

        marks.set(pid("u2"), Timestamp::from_millis(50));
        assert!(needs_read_mark(&log, &marks, &pid("u2")), "mark is stale");

        marks.set(pid("u2"), Timestamp::from_millis(100));
        assert!(!needs_read_mark(&log, &marks, &pid("u2")), "mark is current");
    }

    #[test]
    fn own_messages_never_need_a_mark() {
        let mut log = MessageLog::new();
        log.merge(vec![msg_from("u2", 100)]);

        assert!(!needs_read_mark(&log, &ReadMarks::new(), &pid("u2")));
    }

    #[test]
    fn empty_log_needs_no_mark() {
        assert!(!needs_read_mark(
            &MessageLog::new(),
            &ReadMarks::new(),
            &pid("u1")
        ));
    }
}
