//! Bodies of outbound STOMP SEND frames.

use serde::Serialize;

use crate::domain::{ChatMessage, MessageType};

/// Body of a global or private chat SEND.
///
/// `recipient` is only present on private sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingChatMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender: String,
}

impl OutgoingChatMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&ChatMessage> for OutgoingChatMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            content: message.content.clone(),
            recipient: message.recipient.clone(),
            message_type: message.message_type,
            sender: message.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageTimestamp;

    #[test]
    fn test_global_body_has_no_recipient() {
        // テスト項目: グローバル送信の本文は content / type / sender のみを含む
        // given (前提条件):
        let message = ChatMessage::global("alice", "[Alice][regular] hi");

        // when (操作):
        let json = OutgoingChatMessage::from(&message).to_json().unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            r#"{"content":"[Alice][regular] hi","type":"CHAT","sender":"alice"}"#
        );
    }

    #[test]
    fn test_private_body_drops_local_timestamp() {
        // テスト項目: 個別送信の本文は recipient を含み、ローカルのタイムスタンプは含まない
        // given (前提条件):
        let message = ChatMessage::private("alice", "bob", "hey")
            .with_timestamp(MessageTimestamp::Text("2024-01-01T00:00:00.000Z".to_string()));

        // when (操作):
        let json = OutgoingChatMessage::from(&message).to_json().unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            r#"{"content":"hey","recipient":"bob","type":"CHAT","sender":"alice"}"#
        );
    }
}
