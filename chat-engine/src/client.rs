//! ChatClient - the main interface for Tidechat.
//!
//! This module provides [`ChatClient`], the primary API for presentation
//! layers to open chat sessions, observe the live message view, and
//! issue mutations.
//!
//! # Architecture
//!
//! ChatClient performs I/O through the [`ChatStore`] and
//! [`ParticipantDirectory`] collaborators and folds store deliveries
//! through the pure logic in chat-core.
//!
//! ```text
//! Presentation → ChatClient → ChatStore / ParticipantDirectory → Backend
//!                    ↓
//!               chat-core (merge, read marks, unread counts)
//! ```
//!
//! # Concurrency
//!
//! One logical owner per open session: every fold and mutation for the
//! open session serializes through one mutex-guarded view, and the two
//! subscription folds run on spawned tasks guarded by an epoch counter.
//! Closing the session bumps the epoch, so a delivery or send completion
//! that lands late is discarded, never queued.

use crate::directory::ParticipantDirectory;
use crate::store::{ChatStore, Subscription};
use chat_core::{ChatKey, MessageLog};
use chat_types::{
    ChatError, Message, MessagePayload, Participant, ParticipantId, ReadMarks, Session, SessionId,
};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Default upper bound on text payload size, in bytes.
pub const DEFAULT_MAX_TEXT_LEN: usize = 4096;

/// Configuration for ChatClient.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The authenticated local identity. Sends and read marks are
    /// attributed to this participant.
    pub user: Participant,
    /// Maximum accepted text payload size, in bytes.
    pub max_text_len: usize,
}

impl ChatConfig {
    /// Create a configuration for the authenticated user.
    pub fn new(user: Participant) -> Self {
        Self {
            user,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }

    /// Set the maximum accepted text payload size.
    pub fn with_max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }
}

/// Mutable view of the open session.
///
/// Owned exclusively by the client; subscription folds and mutations are
/// the only writers. The epoch counter invalidates stale task work.
#[derive(Debug, Default)]
struct ViewState {
    epoch: u64,
    session: Option<Session>,
    resolving: bool,
    loading_messages: bool,
    sending: bool,
    log: MessageLog,
    marks: ReadMarks,
    stream_error: Option<ChatError>,
}

/// The main chat client.
///
/// Manages session resolution, the live message view, and mutations.
pub struct ChatClient<S, D> {
    config: ChatConfig,
    store: Arc<S>,
    directory: Arc<D>,
    state: Arc<Mutex<ViewState>>,
    revision: watch::Sender<u64>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl<S, D> ChatClient<S, D>
where
    S: ChatStore + 'static,
    D: ParticipantDirectory,
{
    /// Create a new ChatClient. No session is open yet.
    pub fn new(config: ChatConfig, store: S, directory: D) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            config,
            store: Arc::new(store),
            directory: Arc::new(directory),
            state: Arc::new(Mutex::new(ViewState::default())),
            revision,
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// The authenticated local identity.
    pub fn user(&self) -> &Participant {
        &self.config.user
    }

    /// Get a reference to the underlying store (for testing).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Watch channel that ticks whenever the observable view changes.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Resolve and open the session for a participant set.
    ///
    /// Closes any previously open session first. The participant set may
    /// arrive in any order and contain duplicates; it is canonicalized
    /// before lookup. On success the message and read-mark subscriptions
    /// are live and the view starts filling.
    pub async fn open_session(
        &self,
        participant_ids: Vec<ParticipantId>,
    ) -> Result<Session, ChatError> {
        self.close_session().await;

        let key = ChatKey::new(participant_ids)?;

        {
            let mut state = self.state.lock().await;
            state.resolving = true;
        }
        self.notify();

        let opened = self.resolve_and_subscribe(&key).await;

        let mut state = self.state.lock().await;
        state.resolving = false;
        match opened {
            Ok((session, messages, read_marks)) => {
                state.session = Some(session.clone());
                state.log = MessageLog::new();
                state.marks = session.read_marks.clone();
                state.loading_messages = true;
                state.stream_error = None;
                let epoch = state.epoch;
                drop(state);

                let mut tasks = self.tasks.lock().unwrap();
                tasks.push(tokio::spawn(message_loop(
                    Arc::clone(&self.store),
                    Arc::clone(&self.state),
                    self.revision.clone(),
                    session.id,
                    epoch,
                    messages,
                )));
                tasks.push(tokio::spawn(read_mark_loop(
                    Arc::clone(&self.store),
                    Arc::clone(&self.state),
                    self.revision.clone(),
                    session.id,
                    epoch,
                    read_marks,
                )));
                drop(tasks);

                self.notify();
                tracing::info!(session = %session.id, "session open");
                Ok(session)
            }
            Err(err) => {
                drop(state);
                self.notify();
                Err(err)
            }
        }
    }

    /// Close the open session, cancelling both subscriptions.
    ///
    /// Safe to call when no session is open, and safe to call twice.
    /// In-flight mutations already dispatched to the store are not
    /// cancelled; their results are discarded on arrival.
    pub async fn close_session(&self) {
        let had_session = {
            let mut state = self.state.lock().await;
            let had = state.session.take().is_some();
            // Invalidate anything still in flight for the old session.
            state.epoch += 1;
            state.log = MessageLog::new();
            state.marks = ReadMarks::new();
            state.resolving = false;
            state.loading_messages = false;
            state.sending = false;
            state.stream_error = None;
            had
        };

        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        if had_session {
            tracing::info!("session closed");
            self.notify();
        }
    }

    /// The open session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.session.clone()
    }

    /// Whether session resolution is in progress.
    pub async fn is_resolving(&self) -> bool {
        self.state.lock().await.resolving
    }

    /// Whether the first message delivery is still outstanding.
    ///
    /// False once the first batch - even an empty one - has been folded,
    /// so "no messages yet" is distinguishable from "still loading".
    pub async fn is_loading_messages(&self) -> bool {
        self.state.lock().await.loading_messages
    }

    /// Whether a send is in flight.
    pub async fn is_sending(&self) -> bool {
        self.state.lock().await.sending
    }

    /// Snapshot of the message view, newest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.log.messages().to_vec()
    }

    /// Snapshot of the read-mark map.
    pub async fn read_marks(&self) -> ReadMarks {
        self.state.lock().await.marks.clone()
    }

    /// The stream failure surfaced after a failed recovery, if any.
    pub async fn stream_error(&self) -> Option<ChatError> {
        self.state.lock().await.stream_error.clone()
    }

    /// Number of session participants who have not read the message.
    ///
    /// Derived from the current view; zero when no session is open.
    pub async fn unread_count(&self, message: &Message) -> usize {
        let state = self.state.lock().await;
        match &state.session {
            Some(session) => {
                chat_core::unread_count(message, &session.participant_ids, &state.marks)
            }
            None => 0,
        }
    }

    /// Append a message to the open session.
    ///
    /// The store assigns the id and commit timestamp. On success the
    /// committed record is folded into the view immediately; the
    /// streamed copy shares the id and converges. On failure nothing is
    /// folded, so a failed send leaves no ghost entry.
    pub async fn send_message(&self, payload: MessagePayload) -> Result<Message, ChatError> {
        self.validate_payload(&payload)?;

        let session_id = {
            let mut state = self.state.lock().await;
            let id = state
                .session
                .as_ref()
                .ok_or(ChatError::SessionNotReady)?
                .id;
            state.sending = true;
            id
        };
        self.notify();

        tracing::debug!(session = %session_id, kind = payload.kind(), "sending message");
        let result = self
            .store
            .append_message(session_id, self.config.user.clone(), payload)
            .await;

        let mut state = self.state.lock().await;
        state.sending = false;
        match result {
            Ok(message) => {
                // A send completing after the session closed is discarded.
                if state.session.as_ref().map(|s| s.id) == Some(session_id) {
                    state.log.merge(std::iter::once(message.clone()));
                }
                drop(state);
                self.notify();
                Ok(message)
            }
            Err(err) => {
                drop(state);
                self.notify();
                tracing::warn!(session = %session_id, error = %err, "send failed");
                Err(err.into())
            }
        }
    }

    /// Record that the local user has read the session up to now.
    ///
    /// The store offers only last-write-wins on read marks, so the write
    /// is issued only when the view holds a message newer than the
    /// current mark. Failures are surfaced but not retried; a later
    /// mark-read supersedes a failed one.
    pub async fn mark_read(&self) -> Result<(), ChatError> {
        let reader = self.config.user.id.clone();

        let (session_id, needed) = {
            let state = self.state.lock().await;
            let session = state.session.as_ref().ok_or(ChatError::SessionNotReady)?;
            (
                session.id,
                chat_core::needs_read_mark(&state.log, &state.marks, &reader),
            )
        };
        if !needed {
            tracing::debug!(session = %session_id, "read mark already current");
            return Ok(());
        }

        let at = self
            .store
            .set_read_mark(session_id, &reader)
            .await
            .map_err(|err| {
                tracing::warn!(session = %session_id, error = %err, "read mark write failed");
                ChatError::from(err)
            })?;

        let mut state = self.state.lock().await;
        if state.session.as_ref().map(|s| s.id) == Some(session_id)
            && chat_core::observe_mark(&mut state.marks, &reader, at)
        {
            drop(state);
            self.notify();
        }
        Ok(())
    }

    /// Find the session for a canonical key, creating it on first contact.
    ///
    /// Two-phase find-then-create: two callers racing on the same key can
    /// both miss the existence check and double-create. A backend with
    /// transactional compare-and-create should collapse both phases into
    /// one conditional transaction; with plain document primitives the
    /// race is accepted and documented.
    async fn resolve(&self, key: &ChatKey) -> Result<Session, ChatError> {
        if let Some(mut session) = self.store.find_session(key).await? {
            // Cached participant records may be stale; refresh on open.
            session.participants = self.directory.lookup(&session.participant_ids).await?;
            tracing::debug!(session = %session.id, "resolved existing session");
            return Ok(session);
        }

        let participants = self.directory.lookup(key.as_slice()).await?;
        let session = self.store.create_session(key, participants).await?;
        tracing::debug!(session = %session.id, "created session on first contact");
        Ok(session)
    }

    async fn resolve_and_subscribe(
        &self,
        key: &ChatKey,
    ) -> Result<(Session, Subscription<Vec<Message>>, Subscription<ReadMarks>), ChatError> {
        let session = self.resolve(key).await?;
        let messages = self.store.subscribe_messages(session.id).await?;
        let read_marks = self.store.subscribe_read_marks(session.id).await?;
        Ok((session, messages, read_marks))
    }

    fn validate_payload(&self, payload: &MessagePayload) -> Result<(), ChatError> {
        match payload {
            MessagePayload::Text(text) => {
                if text.is_empty() {
                    return Err(ChatError::InvalidArgument(
                        "text must not be empty".to_string(),
                    ));
                }
                if text.len() > self.config.max_text_len {
                    return Err(ChatError::InvalidArgument(format!(
                        "text exceeds {} bytes",
                        self.config.max_text_len
                    )));
                }
            }
            MessagePayload::Image(url) | MessagePayload::Audio(url) => {
                if url.is_empty() {
                    return Err(ChatError::InvalidArgument(
                        "media reference must not be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn notify(&self) {
        notify_revision(&self.revision);
    }
}

impl<S, D> Drop for ChatClient<S, D> {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

fn notify_revision(revision: &watch::Sender<u64>) {
    revision.send_modify(|r| *r = r.wrapping_add(1));
}

/// Fold message deliveries into the view.
///
/// On a dropped stream, resubscribes once; if the stream fails again
/// before a successful delivery, the disruption is surfaced and the
/// fold terminates. A delivery for a closed epoch is dropped.
async fn message_loop<S: ChatStore>(
    store: Arc<S>,
    state: Arc<Mutex<ViewState>>,
    revision: watch::Sender<u64>,
    session_id: SessionId,
    epoch: u64,
    mut sub: Subscription<Vec<Message>>,
) {
    let mut recovering = false;
    loop {
        match sub.next().await {
            Some(Ok(batch)) => {
                let mut view = state.lock().await;
                if view.epoch != epoch {
                    return;
                }
                let first = view.loading_messages;
                let changed = view.log.merge(batch);
                view.loading_messages = false;
                drop(view);
                if changed || first {
                    notify_revision(&revision);
                }
                recovering = false;
            }
            dropped => {
                let reason = match dropped {
                    Some(Err(err)) => err.to_string(),
                    _ => "subscription closed by store".to_string(),
                };
                if recovering {
                    surface_disruption(&state, &revision, epoch, &reason).await;
                    return;
                }
                recovering = true;
                tracing::warn!(session = %session_id, %reason, "message stream dropped, resubscribing");
                match store.subscribe_messages(session_id).await {
                    Ok(fresh) => {
                        if state.lock().await.epoch != epoch {
                            return;
                        }
                        sub = fresh;
                    }
                    Err(err) => {
                        surface_disruption(&state, &revision, epoch, &err.to_string()).await;
                        return;
                    }
                }
            }
        }
    }
}

/// Fold read-mark snapshots into the view.
///
/// Same recovery policy as the message fold: one resubscription per
/// disruption, then surface.
async fn read_mark_loop<S: ChatStore>(
    store: Arc<S>,
    state: Arc<Mutex<ViewState>>,
    revision: watch::Sender<u64>,
    session_id: SessionId,
    epoch: u64,
    mut sub: Subscription<ReadMarks>,
) {
    let mut recovering = false;
    loop {
        match sub.next().await {
            Some(Ok(snapshot)) => {
                let mut view = state.lock().await;
                if view.epoch != epoch {
                    return;
                }
                let changed = chat_core::merge_marks(&mut view.marks, &snapshot);
                drop(view);
                if changed {
                    notify_revision(&revision);
                }
                recovering = false;
            }
            dropped => {
                let reason = match dropped {
                    Some(Err(err)) => err.to_string(),
                    _ => "subscription closed by store".to_string(),
                };
                if recovering {
                    surface_disruption(&state, &revision, epoch, &reason).await;
                    return;
                }
                recovering = true;
                tracing::warn!(session = %session_id, %reason, "read-mark stream dropped, resubscribing");
                match store.subscribe_read_marks(session_id).await {
                    Ok(fresh) => {
                        if state.lock().await.epoch != epoch {
                            return;
                        }
                        sub = fresh;
                    }
                    Err(err) => {
                        surface_disruption(&state, &revision, epoch, &err.to_string()).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn surface_disruption(
    state: &Mutex<ViewState>,
    revision: &watch::Sender<u64>,
    epoch: u64,
    reason: &str,
) {
    let mut view = state.lock().await;
    if view.epoch != epoch {
        return;
    }
    tracing::warn!(%reason, "stream disrupted, giving up");
    view.stream_error = Some(ChatError::StreamDisrupted(reason.to_string()));
    drop(view);
    notify_revision(revision);
}
