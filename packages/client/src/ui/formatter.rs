//! Message formatting utilities for terminal display.

use campus_chat_shared::time::{millis_to_local_hm, rfc3339_to_local_hm};

use crate::domain::{
    ChatMessage, ConnectionState, ConversationKey, Envelope, MessageTimestamp, MessageType,
    PublishError,
};

const RULE: &str = "------------------------------------------------------------";
const HEAVY_RULE: &str = "============================================================";

/// Message formatter for terminal display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a global chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The received message; its content is decoded as an envelope
    /// * `me` - The current username (to mark own messages)
    pub fn format_global_message(message: &ChatMessage, me: &str) -> String {
        match message.message_type {
            MessageType::Join => format!("\n+ {}\n", message.content),
            MessageType::Leave => format!("\n- {}\n", message.content),
            MessageType::Chat => Self::format_chat("global", message, me),
        }
    }

    /// Format a private message exchanged with `peer`
    pub fn format_private_message(peer: &str, message: &ChatMessage, me: &str) -> String {
        Self::format_chat(&format!("pm {}", peer), message, me)
    }

    fn format_chat(channel: &str, message: &ChatMessage, me: &str) -> String {
        let envelope = Envelope::decode(&message.content, &message.sender);
        let me_suffix = if !me.is_empty() && message.sender == me {
            " (me)"
        } else {
            ""
        };
        let sent_at = message
            .timestamp
            .as_ref()
            .and_then(Self::format_time)
            .map(|time| format!("sent at {}\n", time))
            .unwrap_or_default();
        format!(
            "\n{RULE}\n[{}] @{}{} {}\n{}\n{}{RULE}\n",
            channel,
            envelope.alias,
            me_suffix,
            envelope.flair().label(),
            envelope.text,
            sent_at
        )
    }

    fn format_time(timestamp: &MessageTimestamp) -> Option<String> {
        match timestamp {
            MessageTimestamp::Millis(millis) => millis_to_local_hm(*millis),
            MessageTimestamp::Text(text) => rfc3339_to_local_hm(text),
        }
    }

    /// Format a connection state change
    pub fn format_connection(state: ConnectionState, username: Option<&str>) -> String {
        match state {
            ConnectionState::Connecting => {
                "\nConnecting to chat...\nMessages are session-only and clear on disconnect.\n"
                    .to_string()
            }
            ConnectionState::Connected => format!(
                "\nConnected to campus chat as '{}'. Type messages and press Enter to send.\n",
                username.unwrap_or("?")
            ),
            ConnectionState::Erroring => {
                "\nThe chat server reported an error. Waiting for the connection to recover...\n"
                    .to_string()
            }
            ConnectionState::Disconnected => {
                "\nDisconnected from chat. Messages are session-only and clear on disconnect.\n"
                    .to_string()
            }
        }
    }

    pub fn format_presence(count: u32) -> String {
        format!("\n* Online users: {}\n", count)
    }

    pub fn format_rejected(error: &PublishError) -> String {
        match error {
            PublishError::NotConnected => {
                "\nNot sent: connecting to chat... Messages are session-only.\n".to_string()
            }
            other => format!("\nNot sent: {}\n", other),
        }
    }

    /// Format the transcript of one conversation
    pub fn format_history(key: &ConversationKey, messages: &[ChatMessage], me: &str) -> String {
        let title = match key {
            ConversationKey::Global => "Global chat".to_string(),
            ConversationKey::Private(peer) => format!("Private chat with {}", peer),
        };
        let mut output = format!("\n{HEAVY_RULE}\n{}\n", title);
        if messages.is_empty() {
            output.push_str("(No messages yet)\n");
        }
        for message in messages {
            let line = match key {
                ConversationKey::Global => Self::format_global_message(message, me),
                ConversationKey::Private(peer) => Self::format_private_message(peer, message, me),
            };
            output.push_str(line.trim_start_matches('\n'));
        }
        output.push_str(HEAVY_RULE);
        output.push('\n');
        output
    }

    /// Format the `/who` summary
    pub fn format_who(
        state: ConnectionState,
        presence: u32,
        username: Option<&str>,
        peers: &[String],
    ) -> String {
        let mut output = format!(
            "\nUser: {}\nConnection: {:?}\nOnline users: {}\n",
            username.unwrap_or("(not logged in)"),
            state,
            presence
        );
        if !peers.is_empty() {
            output.push_str(&format!("Private chats: {}\n", peers.join(", ")));
        }
        output
    }

    pub fn format_help() -> String {
        [
            "",
            "Commands:",
            "  <text>                   send to the active conversation",
            "  /pm <user> <message>     send a private message and open that chat",
            "  /open <user>             switch to a private chat",
            "  /global                  switch to the global chat",
            "  /alias <name>            set your display name",
            "  /flair lost|found|regular",
            "  /who                     connection state and online users",
            "  /history [user]          show a transcript",
            "  /login <user> <password>",
            "  /logout",
            "  /quit",
            "",
        ]
        .join("\n")
    }
}
