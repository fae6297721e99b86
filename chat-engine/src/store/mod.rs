//! Backing-store abstraction for the chat engine.
//!
//! This module provides a pluggable document/collection store layer that
//! abstracts the persistence backend (an in-memory store for tests and
//! local use; a hosted document store in production).
//!
//! # Design
//!
//! The store owns everything the engine must never invent itself:
//! document ids and commit timestamps. `append_message` returns the
//! committed record so the caller can echo it locally; the same record
//! arrives again through the subscription and converges by id.
//!
//! Subscriptions are push-driven: each delivery carries only entries
//! added since the previous delivery, and the first delivery is the
//! backlog (possibly empty). Delivery order within a subscription is
//! detection order, which is not guaranteed to equal creation order.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chat_core::ChatKey;
use chat_types::{
    Message, MessagePayload, Participant, ParticipantId, ReadMarks, Session, SessionId, Timestamp,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Store errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or failed the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A stored document failed to deserialize.
    #[error("malformed document: {0}")]
    Corrupt(String),
}

impl From<StoreError> for chat_types::ChatError {
    fn from(err: StoreError) -> Self {
        chat_types::ChatError::StoreUnavailable(err.to_string())
    }
}

/// A live, cancellable stream of store deliveries.
///
/// `Ok` items are deliveries; an `Err` item reports that the backend
/// dropped the stream. Dropping the subscription releases it.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, StoreError>>,
}

impl<T> Subscription<T> {
    /// Create a linked sender/subscription pair.
    ///
    /// Store implementations keep the sender and deliver through it;
    /// a send fails once the subscriber is gone, which is the signal to
    /// prune the registration.
    pub fn channel() -> (mpsc::UnboundedSender<Result<T, StoreError>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the store has dropped its end.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        self.rx.recv().await
    }
}

/// The backing document/collection store collaborator.
///
/// Implementations must assign ids and commit timestamps server-side,
/// with timestamps non-decreasing for a single writer issuing
/// sequential requests.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Find the session whose stored participant-id sequence equals the
    /// canonical key exactly.
    ///
    /// Exact sequence match, not set match: canonicalization makes
    /// sequence equality sufficient.
    async fn find_session(&self, key: &ChatKey) -> Result<Option<Session>, StoreError>;

    /// Create a session document for the canonical key.
    ///
    /// Returns the session with its store-assigned id.
    async fn create_session(
        &self,
        key: &ChatKey,
        participants: Vec<Participant>,
    ) -> Result<Session, StoreError>;

    /// Append a message to a session's message collection.
    ///
    /// The store assigns the message id and the commit timestamp and
    /// returns the committed record.
    async fn append_message(
        &self,
        session: SessionId,
        sender: Participant,
        payload: MessagePayload,
    ) -> Result<Message, StoreError>;

    /// Update one participant's read mark to the store's current time.
    ///
    /// Addressed as a single-field update (`readMarks.<participantId>`),
    /// last write wins. Returns the assigned time.
    async fn set_read_mark(
        &self,
        session: SessionId,
        participant: &ParticipantId,
    ) -> Result<Timestamp, StoreError>;

    /// Subscribe to a session's message collection.
    ///
    /// The first delivery is the current backlog (possibly empty);
    /// subsequent deliveries carry only newly appended messages.
    async fn subscribe_messages(
        &self,
        session: SessionId,
    ) -> Result<Subscription<Vec<Message>>, StoreError>;

    /// Subscribe to a session's read-mark map.
    ///
    /// Each delivery is a full snapshot of the map; the first delivery
    /// is the current state.
    async fn subscribe_read_marks(
        &self,
        session: SessionId,
    ) -> Result<Subscription<ReadMarks>, StoreError>;
}
