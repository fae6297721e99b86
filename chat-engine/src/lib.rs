//! # chat-engine
//!
//! The Tidechat synchronization engine.
//!
//! Resolves a unique chat session from an unordered participant set,
//! maintains a live deduplicated view of the session's messages, and
//! tracks per-participant read marks.
//!
//! # Architecture
//!
//! The engine performs I/O through two collaborator traits and folds
//! store deliveries through the pure logic in chat-core.
//!
//! ```text
//! Presentation → ChatClient → ChatStore / ParticipantDirectory → Backend
//!                    ↓
//!               chat-core (pure merge and unread logic)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chat_engine::{ChatClient, ChatConfig, MemoryDirectory, MemoryStore};
//! use chat_types::{MessagePayload, Participant, ParticipantId};
//!
//! let me = Participant::new("u1", "Alice", "alice@example.com");
//! let client = ChatClient::new(ChatConfig::new(me), MemoryStore::new(), directory);
//!
//! client.open_session(vec![ParticipantId::new("u1"), ParticipantId::new("u2")]).await?;
//! client.send_message(MessagePayload::text("hi")).await?;
//! client.mark_read().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod directory;
pub mod store;

pub use client::{ChatClient, ChatConfig};
pub use directory::{DirectoryError, MemoryDirectory, ParticipantDirectory};
pub use store::{ChatStore, MemoryStore, StoreError, Subscription};
