//! Chat message as carried on the wire and kept in transcripts.

use serde::{Deserialize, Deserializer, Serialize};

/// Sender name the broker uses for presence-only broadcasts.
pub const SYSTEM_SENDER: &str = "System";

/// Prefix of a presence-only broadcast's content.
pub const PRESENCE_PREFIX: &str = "Online users:";

/// Kind of a chat message. A frame without a `type` is a plain chat message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Chat,
    Join,
    Leave,
}

/// Message timestamp as sent by the broker or stamped locally.
///
/// The broker may send either an ISO 8601 string or epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTimestamp {
    Millis(i64),
    Text(String),
}

/// One chat message.
///
/// `content` of a CHAT message normally carries an [`Envelope`](super::Envelope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<MessageTimestamp>,
}

impl ChatMessage {
    /// A CHAT message to the global channel.
    pub fn global(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: None,
            content: content.into(),
            message_type: MessageType::Chat,
            timestamp: None,
        }
    }

    /// A CHAT message to one recipient.
    pub fn private(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Some(recipient.into()),
            ..Self::global(sender, content)
        }
    }

    pub fn with_timestamp(mut self, timestamp: MessageTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse an inbound frame body. Returns `None` for anything that is not a chat message.
    pub fn from_json(body: &str) -> Option<Self> {
        match serde_json::from_str(body) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Dropping malformed chat frame: {}", e);
                None
            }
        }
    }

    pub fn is_presence_event(&self) -> bool {
        matches!(self.message_type, MessageType::Join | MessageType::Leave)
    }

    /// A broadcast that only carries the online count and never appears in a transcript.
    pub fn is_presence_only(&self) -> bool {
        self.sender == SYSTEM_SENDER && self.content.starts_with(PRESENCE_PREFIX)
    }

    /// Same content, sender and recipient. Timestamps are ignored.
    pub fn same_payload(&self, other: &ChatMessage) -> bool {
        self.content == other.content
            && self.sender == other.sender
            && self.recipient == other.recipient
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
