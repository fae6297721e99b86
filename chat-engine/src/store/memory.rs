//! In-memory document store.
//!
//! Reference implementation of [`ChatStore`] used by tests and local
//! tooling. Documents are kept as [`serde_json::Value`] so read-mark
//! writes go through the same `readMarks.<participantId>` field-path
//! addressing a hosted document store would use.
//!
//! Supports failure and disruption injection for exercising error paths
//! without a network.

use super::{ChatStore, StoreError, Subscription};
use async_trait::async_trait;
use chat_core::ChatKey;
use chat_types::{
    Message, MessageId, MessagePayload, Participant, ParticipantId, ReadMarks, Session, SessionId,
    Timestamp,
};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Default)]
struct Failures {
    find: Option<String>,
    create: Option<String>,
    append: Option<String>,
    mark: Option<String>,
    subscribe_messages: Option<String>,
    subscribe_read_marks: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Session documents keyed by id.
    sessions: DashMap<SessionId, Value>,
    /// Message documents per session, in append order.
    messages: DashMap<SessionId, Vec<Value>>,
    /// Live message subscribers per session.
    message_subs: DashMap<SessionId, Vec<UnboundedSender<Result<Vec<Message>, StoreError>>>>,
    /// Live read-mark subscribers per session.
    mark_subs: DashMap<SessionId, Vec<UnboundedSender<Result<ReadMarks, StoreError>>>>,
    /// Last assigned commit timestamp, for the monotonic server clock.
    clock: AtomicI64,
    /// Forced-failure injection points.
    failures: Mutex<Failures>,
}

/// In-memory [`ChatStore`] with a monotonic server clock.
///
/// Clones share state, so a test can keep a handle for injecting
/// failures or appending messages while the engine owns another.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a commit timestamp.
    ///
    /// Wall clock, clamped strictly increasing: same-millisecond commits
    /// still get distinct, ordered timestamps.
    fn server_now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let prev = self
            .inner
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(wall.max(prev + 1))
            })
            .unwrap_or(wall);
        Timestamp::from_millis(wall.max(prev + 1))
    }

    fn take_failure(
        &self,
        pick: impl FnOnce(&mut Failures) -> &mut Option<String>,
    ) -> Result<(), StoreError> {
        let mut failures = self.inner.failures.lock().unwrap();
        match pick(&mut failures).take() {
            Some(error) => Err(StoreError::Unavailable(error)),
            None => Ok(()),
        }
    }

    /// Cause the next `find_session` to fail with the given error.
    pub fn fail_next_find(&self, error: &str) {
        self.inner.failures.lock().unwrap().find = Some(error.to_string());
    }

    /// Cause the next `create_session` to fail with the given error.
    pub fn fail_next_create(&self, error: &str) {
        self.inner.failures.lock().unwrap().create = Some(error.to_string());
    }

    /// Cause the next `append_message` to fail with the given error.
    pub fn fail_next_append(&self, error: &str) {
        self.inner.failures.lock().unwrap().append = Some(error.to_string());
    }

    /// Cause the next `set_read_mark` to fail with the given error.
    pub fn fail_next_mark(&self, error: &str) {
        self.inner.failures.lock().unwrap().mark = Some(error.to_string());
    }

    /// Cause the next `subscribe_messages` to fail with the given error.
    pub fn fail_next_subscribe_messages(&self, error: &str) {
        self.inner.failures.lock().unwrap().subscribe_messages = Some(error.to_string());
    }

    /// Cause the next `subscribe_read_marks` to fail with the given error.
    pub fn fail_next_subscribe_read_marks(&self, error: &str) {
        self.inner.failures.lock().unwrap().subscribe_read_marks = Some(error.to_string());
    }

    /// Drop all message subscribers for a session with a stream error.
    ///
    /// Subscribers observe the error and must resubscribe to continue.
    pub fn disrupt_messages(&self, session: SessionId, reason: &str) {
        if let Some((_, subs)) = self.inner.message_subs.remove(&session) {
            for tx in subs {
                let _ = tx.send(Err(StoreError::Unavailable(reason.to_string())));
            }
        }
    }

    /// Drop all read-mark subscribers for a session with a stream error.
    pub fn disrupt_read_marks(&self, session: SessionId, reason: &str) {
        if let Some((_, subs)) = self.inner.mark_subs.remove(&session) {
            for tx in subs {
                let _ = tx.send(Err(StoreError::Unavailable(reason.to_string())));
            }
        }
    }

    /// Number of session documents. Test helper.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Number of message documents in a session. Test helper.
    pub fn message_count(&self, session: SessionId) -> usize {
        self.inner
            .messages
            .get(&session)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn decode_session(doc: &Value) -> Result<Session, StoreError> {
        serde_json::from_value(doc.clone()).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn decode_message(doc: &Value) -> Result<Message, StoreError> {
        serde_json::from_value(doc.clone()).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn notify_message_subs(&self, session: SessionId, batch: Vec<Message>) {
        if let Some(mut subs) = self.inner.message_subs.get_mut(&session) {
            subs.retain(|tx| tx.send(Ok(batch.clone())).is_ok());
        }
    }

    fn notify_mark_subs(&self, session: SessionId, marks: ReadMarks) {
        if let Some(mut subs) = self.inner.mark_subs.get_mut(&session) {
            subs.retain(|tx| tx.send(Ok(marks.clone())).is_ok());
        }
    }
}

/// Set a dot-separated field path on a JSON document.
///
/// `set_field(doc, "readMarks.u2", v)` addresses the nested field the
/// way a document store's single-field update does.
fn set_field(doc: &mut Value, path: &str, value: Value) {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    let mut target = doc;
    if let Some(parents) = parents {
        for part in parents.split('.') {
            target = &mut target[part];
        }
    }
    target[leaf] = value;
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_session(&self, key: &ChatKey) -> Result<Option<Session>, StoreError> {
        self.take_failure(|f| &mut f.find)?;

        for entry in self.inner.sessions.iter() {
            let session = Self::decode_session(entry.value())?;
            if session.participant_ids.as_slice() == key.as_slice() {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    async fn create_session(
        &self,
        key: &ChatKey,
        participants: Vec<Participant>,
    ) -> Result<Session, StoreError> {
        self.take_failure(|f| &mut f.create)?;

        let session = Session {
            id: SessionId::new(),
            participant_ids: key.as_slice().to_vec(),
            participants,
            read_marks: ReadMarks::new(),
        };
        let doc = serde_json::to_value(&session).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.inner.sessions.insert(session.id, doc);
        tracing::debug!(session = %session.id, "created session document");
        Ok(session)
    }

    async fn append_message(
        &self,
        session: SessionId,
        sender: Participant,
        payload: MessagePayload,
    ) -> Result<Message, StoreError> {
        self.take_failure(|f| &mut f.append)?;

        if !self.inner.sessions.contains_key(&session) {
            return Err(StoreError::NotFound(session.to_string()));
        }

        let message = Message {
            id: MessageId::new(),
            sender,
            payload,
            created_at: self.server_now(),
        };
        let doc = serde_json::to_value(&message).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.inner.messages.entry(session).or_default().push(doc);

        self.notify_message_subs(session, vec![message.clone()]);
        Ok(message)
    }

    async fn set_read_mark(
        &self,
        session: SessionId,
        participant: &ParticipantId,
    ) -> Result<Timestamp, StoreError> {
        self.take_failure(|f| &mut f.mark)?;

        let at = self.server_now();
        let marks = {
            let mut doc = self
                .inner
                .sessions
                .get_mut(&session)
                .ok_or_else(|| StoreError::NotFound(session.to_string()))?;
            set_field(
                &mut doc,
                &format!("readMarks.{}", participant),
                Value::from(at.millis()),
            );
            serde_json::from_value::<ReadMarks>(doc["readMarks"].clone())
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
        };

        self.notify_mark_subs(session, marks);
        Ok(at)
    }

    async fn subscribe_messages(
        &self,
        session: SessionId,
    ) -> Result<Subscription<Vec<Message>>, StoreError> {
        self.take_failure(|f| &mut f.subscribe_messages)?;

        if !self.inner.sessions.contains_key(&session) {
            return Err(StoreError::NotFound(session.to_string()));
        }

        let backlog = match self.inner.messages.get(&session) {
            Some(docs) => docs
                .iter()
                .map(Self::decode_message)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let (tx, sub) = Subscription::channel();
        // First delivery: the backlog, even when empty.
        let _ = tx.send(Ok(backlog));
        self.inner.message_subs.entry(session).or_default().push(tx);
        Ok(sub)
    }

    async fn subscribe_read_marks(
        &self,
        session: SessionId,
    ) -> Result<Subscription<ReadMarks>, StoreError> {
        self.take_failure(|f| &mut f.subscribe_read_marks)?;

        let marks = {
            let doc = self
                .inner
                .sessions
                .get(&session)
                .ok_or_else(|| StoreError::NotFound(session.to_string()))?;
            serde_json::from_value::<ReadMarks>(doc["readMarks"].clone())
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
        };

        let (tx, sub) = Subscription::channel();
        let _ = tx.send(Ok(marks));
        self.inner.mark_subs.entry(session).or_default().push(tx);
        Ok(sub)
    }
}
