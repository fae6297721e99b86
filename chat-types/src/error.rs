//! Error taxonomy for Tidechat.

use thiserror::Error;

/// Errors surfaced to callers of the chat engine.
///
/// Every failure is a distinct, typed outcome so presentation can react
/// (disable send, show a retry affordance) instead of guessing from a
/// message string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Malformed participant set or payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more participant ids could not be resolved by the directory.
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    /// A mutation was attempted before session resolution completed.
    #[error("session not ready")]
    SessionNotReady,

    /// The backing store could not be reached or failed the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A subscription dropped and the single automatic resubscription
    /// attempt did not recover it.
    #[error("stream disrupted: {0}")]
    StreamDisrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChatError::ParticipantNotFound("u9".to_string());
        assert_eq!(err.to_string(), "participant not found: u9");

        assert_eq!(ChatError::SessionNotReady.to_string(), "session not ready");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatError>();
    }
}
