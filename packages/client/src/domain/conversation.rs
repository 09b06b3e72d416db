//! Conversation transcripts and the reducer that mutates them.
//!
//! All mutations go through [`ConversationStore::append_global`],
//! [`ConversationStore::append_private`] and [`ConversationStore::reset`].
//! Transcripts are append-only and kept in arrival order.

use std::collections::HashMap;

use super::ChatMessage;

/// Key of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConversationKey {
    /// The broadcast channel everyone shares
    #[default]
    Global,
    /// A one-to-one conversation with the named user
    Private(String),
}

/// In-memory transcripts for the active session.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    global: Vec<ChatMessage>,
    private: HashMap<String, Vec<ChatMessage>>,
    /// Peers in the order their conversation was first created
    peers: Vec<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the global transcript.
    ///
    /// Presence-only broadcasts (`System` sender, content starting with
    /// `Online users:`) are suppressed. Returns whether the message was appended.
    pub fn append_global(&mut self, message: ChatMessage) -> bool {
        if message.is_presence_only() {
            tracing::debug!("Suppressing presence-only broadcast: {}", message.content);
            return false;
        }
        self.global.push(message);
        true
    }

    /// Append to the conversation with `peer` unless the message repeats the
    /// current tail (same content, sender and recipient).
    ///
    /// Only the last entry is inspected. Returns whether the message was appended.
    pub fn append_private(&mut self, peer: &str, message: ChatMessage) -> bool {
        if !self.private.contains_key(peer) {
            self.peers.push(peer.to_string());
        }
        let transcript = self.private.entry(peer.to_string()).or_default();

        if transcript
            .last()
            .is_some_and(|last| last.same_payload(&message))
        {
            tracing::debug!("Duplicate private message from '{}' skipped", message.sender);
            return false;
        }

        transcript.push(message);
        true
    }

    /// Clear every conversation.
    pub fn reset(&mut self) {
        self.global.clear();
        self.private.clear();
        self.peers.clear();
    }

    pub fn global(&self) -> &[ChatMessage] {
        &self.global
    }

    pub fn private(&self, peer: &str) -> &[ChatMessage] {
        self.private.get(peer).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, key: &ConversationKey) -> &[ChatMessage] {
        match key {
            ConversationKey::Global => self.global(),
            ConversationKey::Private(peer) => self.private(peer),
        }
    }

    /// Private correspondents in first-contact order.
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.private.is_empty()
    }
}
