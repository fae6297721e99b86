//! # chat-types
//!
//! Foundational types for the Tidechat synchronization engine.
//!
//! This crate provides the types shared across all Tidechat crates:
//! - [`ParticipantId`], [`SessionId`], [`MessageId`], [`Timestamp`] - Identity and ordering types
//! - [`Participant`], [`MessagePayload`], [`Message`] - Chat records
//! - [`Session`], [`ReadMarks`] - Session state
//! - [`ChatError`] - Error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod records;
mod session;

pub use error::ChatError;
pub use ids::{MessageId, ParticipantId, SessionId, Timestamp};
pub use records::{Message, MessagePayload, Participant};
pub use session::{ReadMarks, Session};
