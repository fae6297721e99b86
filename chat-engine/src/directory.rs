//! Participant directory collaborator.
//!
//! Resolves participant ids to profile records. Read-only from the
//! engine's perspective; profile records are owned by the identity
//! provider.

use async_trait::async_trait;
use chat_types::{Participant, ParticipantId};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

/// Directory errors.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// One or more requested ids have no profile record.
    #[error("unknown participants: {0}")]
    NotFound(String),

    /// The directory backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for chat_types::ChatError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(ids) => chat_types::ChatError::ParticipantNotFound(ids),
            DirectoryError::Unavailable(reason) => chat_types::ChatError::StoreUnavailable(reason),
        }
    }
}

/// Resolves participant ids to profile records.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Resolve a set of participant ids in one query.
    ///
    /// Returns records in the order of the requested ids. Fails with
    /// [`DirectoryError::NotFound`] if any id is unresolvable; a partial
    /// result is never returned.
    async fn lookup(&self, ids: &[ParticipantId]) -> Result<Vec<Participant>, DirectoryError>;
}

/// In-memory [`ParticipantDirectory`] for tests and local use.
///
/// Clones share state.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: Arc<DashMap<ParticipantId, Participant>>,
}

impl Clone for MemoryDirectory {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile record.
    pub fn insert(&self, participant: Participant) {
        self.records.insert(participant.id.clone(), participant);
    }

    /// Build a directory from profile records.
    pub fn with_participants<I>(participants: I) -> Self
    where
        I: IntoIterator<Item = Participant>,
    {
        let directory = Self::new();
        for p in participants {
            directory.insert(p);
        }
        directory
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryDirectory {
    async fn lookup(&self, ids: &[ParticipantId]) -> Result<Vec<Participant>, DirectoryError> {
        let mut records = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.records.get(id) {
                Some(record) => records.push(record.clone()),
                None => missing.push(id.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DirectoryError::NotFound(missing.join(", ")));
        }
        Ok(records)
    }
}
