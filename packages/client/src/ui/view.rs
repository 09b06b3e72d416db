//! Terminal-side view of the chat, mirrored from `ChatUpdate`s.

use crate::{
    domain::{ConnectionState, ConversationKey, ConversationStore, Flair},
    usecase::ChatUpdate,
};

use super::formatter::MessageFormatter;

#[derive(Debug, Default)]
pub struct ViewState {
    pub username: Option<String>,
    /// Display name override; the username when unset
    pub alias: Option<String>,
    pub flair: Flair,
    pub active: ConversationKey,
    pub connection: ConnectionState,
    pub presence: u32,
    pub conversations: ConversationStore,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_default()
    }

    pub fn prompt(&self) -> String {
        let user = self.username.as_deref().unwrap_or("guest");
        match &self.active {
            ConversationKey::Global => format!("{}@global> ", user),
            ConversationKey::Private(peer) => format!("{}@{}> ", user, peer),
        }
    }

    /// Apply an update and return what to print for it, if anything.
    pub fn apply(&mut self, update: ChatUpdate) -> Option<String> {
        let me = self.username.clone().unwrap_or_default();
        match update {
            ChatUpdate::ConnectionChanged(state) => {
                self.connection = state;
                Some(MessageFormatter::format_connection(
                    state,
                    self.username.as_deref(),
                ))
            }
            ChatUpdate::IdentityChanged(identity) => {
                let username = identity.map(|identity| identity.username);
                if username != self.username {
                    self.alias = None;
                    self.active = ConversationKey::Global;
                }
                self.username = username;
                None
            }
            ChatUpdate::GlobalMessage(message) => {
                let output = MessageFormatter::format_global_message(&message, &me);
                self.conversations.append_global(message).then_some(output)
            }
            ChatUpdate::PrivateMessage { peer, message } => {
                let output = MessageFormatter::format_private_message(&peer, &message, &me);
                self.conversations
                    .append_private(&peer, message)
                    .then_some(output)
            }
            ChatUpdate::PresenceChanged(count) => {
                self.presence = count;
                (count > 0).then(|| MessageFormatter::format_presence(count))
            }
            ChatUpdate::Cleared => {
                self.conversations.reset();
                None
            }
            ChatUpdate::PublishRejected(error) => Some(MessageFormatter::format_rejected(&error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatMessage, UserIdentity};

    #[test]
    fn test_alias_defaults_to_username() {
        // テスト項目: 別名未設定ならユーザー名、ユーザーが変わると別名はリセットされる
        // given (前提条件):
        let mut view = ViewState::new();
        view.apply(ChatUpdate::IdentityChanged(Some(UserIdentity::student("alice"))));
        let default_alias = view.alias().to_string();
        view.alias = Some("Ali".to_string());

        // when (操作):
        view.apply(ChatUpdate::IdentityChanged(Some(UserIdentity::student("bob"))));

        // then (期待する結果):
        assert_eq!(default_alias, "alice");
        assert_eq!(view.alias(), "bob");
        assert_eq!(view.prompt(), "bob@global> ");
    }

    #[test]
    fn test_mirror_follows_updates() {
        // テスト項目: 受信・クリア通知で会話のミラーが更新される
        // given (前提条件):
        let mut view = ViewState::new();
        view.apply(ChatUpdate::IdentityChanged(Some(UserIdentity::student("alice"))));

        // when (操作):
        let printed = view.apply(ChatUpdate::PrivateMessage {
            peer: "bob".to_string(),
            message: ChatMessage::private("bob", "alice", "[Bob][found] got your keys"),
        });
        let peers_before_clear = view.conversations.peers().to_vec();
        view.apply(ChatUpdate::Cleared);

        // then (期待する結果):
        assert!(printed.is_some_and(|output| output.contains("got your keys")));
        assert_eq!(peers_before_clear, vec!["bob".to_string()]);
        assert!(view.conversations.is_empty());
    }

    #[test]
    fn test_presence_reset_is_silent() {
        // テスト項目: 在席数 0 へのリセットは表示しない
        // given (前提条件):
        let mut view = ViewState::new();

        // when (操作):
        let reset = view.apply(ChatUpdate::PresenceChanged(0));
        let update = view.apply(ChatUpdate::PresenceChanged(4));

        // then (期待する結果):
        assert_eq!(reset, None);
        assert!(update.is_some_and(|output| output.contains("Online users: 4")));
        assert_eq!(view.presence, 4);
    }
}
