//! Participant and message records.

use crate::ids::{MessageId, ParticipantId, Timestamp};
use serde::{Deserialize, Serialize};

/// A participant profile record.
///
/// Owned by the external identity/profile directory; immutable from the
/// engine's viewpoint. The engine caches resolved records on the session
/// and refreshes them on every session open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Stable identity id.
    pub id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Contact email.
    pub email: String,
    /// Optional opaque reference to a profile image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_ref: Option<String>,
}

impl Participant {
    /// Create a participant record without a profile image.
    pub fn new(
        id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            profile_image_ref: None,
        }
    }

    /// Set the profile image reference.
    pub fn with_profile_image(mut self, image_ref: impl Into<String>) -> Self {
        self.profile_image_ref = Some(image_ref.into());
        self
    }
}

/// The content of a message: exactly one of text, image, or audio.
///
/// Image and audio are opaque URL references; the engine never touches
/// the media bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// A plain text message.
    #[serde(rename = "text")]
    Text(String),
    /// An image, referenced by URL.
    #[serde(rename = "imageRef")]
    Image(String),
    /// An audio clip, referenced by URL.
    #[serde(rename = "audioRef")]
    Audio(String),
}

impl MessagePayload {
    /// Create a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create an image payload from an image URL.
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image(url.into())
    }

    /// Create an audio payload from an audio URL.
    pub fn audio(url: impl Into<String>) -> Self {
        Self::Audio(url.into())
    }

    /// Short label for the payload kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
        }
    }
}

/// A committed chat message.
///
/// Immutable once created. `created_at` is the store-assigned commit
/// timestamp, never a sender clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned message id.
    pub id: MessageId,
    /// The sender's profile record at send time.
    pub sender: Participant,
    /// Message content.
    pub payload: MessagePayload,
    /// Store-assigned commit timestamp.
    pub created_at: Timestamp,
}
