//! UseCase: チャットサービス
//!
//! 接続状態・会話・在席数を一つのオブジェクトが所有し、
//! セッションイベント・トランスポートイベント・UI コマンドを単一のイベントループで処理します。
//!
//! ## 設計
//! - 各ハンドラは同期メソッドで、テストはランタイムなしで決定的に駆動できる
//! - 状態遷移は `ConnectionState::transition` に集約
//! - 会話の変更は `ConversationStore` の 2 つの append のみ
//! - UI への通知は `ChatUpdate` をチャネルで送る

use std::sync::Arc;

use campus_chat_shared::time::Clock;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    config::ClientConfig,
    domain::{
        ChatMessage, ConnectRequest, ConnectionEvent, ConnectionState, ConversationStore,
        MessageTimestamp, PresenceCounter, PublishError, Transport, TransportEvent,
        TransportHandle, UserIdentity,
    },
    infrastructure::dto::chat::OutgoingChatMessage,
};

use super::{
    session_store::SessionEvent,
    subscription::{
        InboundFrame, SEND_GLOBAL_DESTINATION, SEND_PRIVATE_DESTINATION, SubscriptionRegistry,
    },
};

/// Requests from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Connect,
    Disconnect,
    PublishGlobal(String),
    PublishPrivate { recipient: String, content: String },
    Shutdown,
}

/// Notifications to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    ConnectionChanged(ConnectionState),
    IdentityChanged(Option<UserIdentity>),
    GlobalMessage(ChatMessage),
    PrivateMessage { peer: String, message: ChatMessage },
    PresenceChanged(u32),
    /// Every conversation was emptied
    Cleared,
    PublishRejected(PublishError),
}

/// チャットサービス本体
pub struct ChatService {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: ClientConfig,
    identity: Option<UserIdentity>,
    state: ConnectionState,
    /// 接続中（または自動再接続中）のトランスポート
    handle: Option<Box<dyn TransportHandle>>,
    /// 現在のトランスポートからのイベント。接続ごとに作り直す
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    registry: SubscriptionRegistry,
    conversations: ConversationStore,
    presence: PresenceCounter,
    updates: mpsc::UnboundedSender<ChatUpdate>,
}

impl ChatService {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: ClientConfig,
        updates: mpsc::UnboundedSender<ChatUpdate>,
    ) -> Self {
        Self {
            transport,
            clock,
            config,
            identity: None,
            state: ConnectionState::Disconnected,
            handle: None,
            transport_events: None,
            registry: SubscriptionRegistry::new(),
            conversations: ConversationStore::new(),
            presence: PresenceCounter::new(),
            updates,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn presence(&self) -> u32 {
        self.presence.count()
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    /// 接続を開始
    ///
    /// ユーザー未設定、既に接続中・接続処理中、または自動再接続中のトランスポートがある場合は何もしない。
    /// 接続を開始した場合は `true` を返す。
    pub fn connect(&mut self) -> bool {
        let Some(identity) = self.identity.as_ref() else {
            tracing::debug!("connect ignored: no logged-in user");
            return false;
        };
        if self.handle.is_some() || self.state.is_active() {
            tracing::debug!("connect ignored: already {:?}", self.state);
            return false;
        }
        let next = match self.state.transition(ConnectionEvent::Open) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("{}", e);
                return false;
            }
        };

        let request = ConnectRequest {
            username: identity.username.clone(),
            reconnect_delay: self.config.reconnect_delay,
            heartbeat_outgoing: self.config.heartbeat_outgoing,
            heartbeat_incoming: self.config.heartbeat_incoming,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.transport.open(request, events_tx) {
            Ok(handle) => {
                tracing::info!("Connecting to chat as {}", identity.username);
                self.handle = Some(handle);
                self.transport_events = Some(events_rx);
                self.set_state(next);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to open transport: {}", e);
                false
            }
        }
    }

    /// 接続を終了し、すべての会話をクリア
    ///
    /// 在席数はクリアしない（再接続時にリセットされる）。
    pub fn disconnect(&mut self) {
        if self.handle.is_none() && !self.state.is_active() {
            return;
        }
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.transport_events = None;
        self.registry.clear();
        self.apply(ConnectionEvent::Closed);
        self.conversations.reset();
        self.notify(ChatUpdate::Cleared);
        tracing::info!("Disconnected from chat");
    }

    /// グローバルチャンネルへ送信
    pub fn publish_global(&mut self, content: &str) -> Result<(), PublishError> {
        let sender = self.publisher()?;
        if content.trim().is_empty() {
            return Err(PublishError::EmptyContent);
        }
        let message = ChatMessage::global(sender, content);
        self.send(SEND_GLOBAL_DESTINATION, &message)
    }

    /// 個人宛てに送信し、ローカルの会話に即時追加（楽観的エコー）
    pub fn publish_private(&mut self, recipient: &str, content: &str) -> Result<(), PublishError> {
        let sender = self.publisher()?;
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(PublishError::EmptyRecipient);
        }
        if content.trim().is_empty() {
            return Err(PublishError::EmptyContent);
        }
        let message = ChatMessage::private(sender, recipient, content);
        self.send(SEND_PRIVATE_DESTINATION, &message)?;

        let echo = message.with_timestamp(MessageTimestamp::Text(self.clock.now_iso8601()));
        if self.conversations.append_private(recipient, echo.clone()) {
            self.notify(ChatUpdate::PrivateMessage {
                peer: recipient.to_string(),
                message: echo,
            });
        }
        Ok(())
    }

    fn publisher(&self) -> Result<String, PublishError> {
        if !self.state.is_connected() {
            return Err(PublishError::NotConnected);
        }
        self.identity
            .as_ref()
            .map(|identity| identity.username.clone())
            .ok_or(PublishError::NoIdentity)
    }

    fn send(&mut self, destination: &str, message: &ChatMessage) -> Result<(), PublishError> {
        let body = OutgoingChatMessage::from(message)
            .to_json()
            .map_err(|e| PublishError::Encoding(e.to_string()))?;
        let handle = self.handle.as_mut().ok_or(PublishError::NotConnected)?;
        handle.publish(destination, body)?;
        tracing::debug!("Published to {}", destination);
        Ok(())
    }

    /// セッションイベントを処理
    ///
    /// ログインで接続、ログアウトで切断する。別ユーザーへの切り替えは再接続する。
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::UserLogin(identity) => {
                let same_user = self
                    .identity
                    .as_ref()
                    .is_some_and(|current| current.username == identity.username);
                if same_user && (self.handle.is_some() || self.state.is_active()) {
                    tracing::debug!("Already signed in as {}", identity.username);
                    return;
                }
                if !same_user {
                    self.disconnect();
                }
                self.identity = Some(identity.clone());
                self.notify(ChatUpdate::IdentityChanged(Some(identity)));
                self.connect();
            }
            SessionEvent::UserLogout => {
                self.disconnect();
                if self.identity.take().is_some() {
                    self.notify(ChatUpdate::IdentityChanged(None));
                }
            }
        }
    }

    /// トランスポートイベントを処理
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_handshake(),
            TransportEvent::Frame {
                subscription,
                destination,
                body,
            } => self.on_frame(subscription.as_deref(), &destination, &body),
            TransportEvent::ProtocolError(reason) => {
                tracing::warn!("Broker reported an error: {}", reason);
                self.apply(ConnectionEvent::ProtocolFailed);
            }
            TransportEvent::TransportError(reason) => {
                tracing::warn!("Connection lost: {}", reason);
                self.apply(ConnectionEvent::TransportFailed);
            }
            TransportEvent::Closed => {
                self.handle = None;
                self.transport_events = None;
                self.registry.clear();
                self.apply(ConnectionEvent::Closed);
            }
        }
    }

    /// ハンドシェイク成功: 会話と在席数をリセットし、購読を張り直す
    fn on_handshake(&mut self) {
        let Some(username) = self.identity.as_ref().map(|i| i.username.clone()) else {
            tracing::warn!("Handshake completed without a logged-in user");
            return;
        };
        let next = match self.state.transition(ConnectionEvent::HandshakeSucceeded) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("{}", e);
                return;
            }
        };

        self.conversations.reset();
        self.notify(ChatUpdate::Cleared);
        self.presence.reset();
        self.notify(ChatUpdate::PresenceChanged(0));
        self.set_state(next);
        tracing::info!("Connected to chat as {}", username);

        let subscriptions = self.registry.bind(&username);
        if let Some(handle) = self.handle.as_mut() {
            for subscription in subscriptions {
                if let Err(e) = handle.subscribe(&subscription.id, &subscription.destination) {
                    tracing::warn!("Failed to subscribe to {}: {}", subscription.destination, e);
                }
            }
        }
    }

    fn on_frame(&mut self, subscription: Option<&str>, destination: &str, body: &str) {
        match self.registry.route(subscription, destination, body) {
            Some(InboundFrame::Global(message)) => {
                if message.is_presence_event()
                    && let Some(count) = self.presence.update_from_content(&message.content)
                {
                    self.notify(ChatUpdate::PresenceChanged(count));
                }
                if self.conversations.append_global(message.clone()) {
                    self.notify(ChatUpdate::GlobalMessage(message));
                }
            }
            Some(InboundFrame::Private { peer, message }) => {
                if self.conversations.append_private(&peer, message.clone()) {
                    self.notify(ChatUpdate::PrivateMessage { peer, message });
                }
            }
            None => {}
        }
    }

    pub fn handle_command(&mut self, command: ChatCommand) {
        let result = match command {
            ChatCommand::Connect => {
                self.connect();
                Ok(())
            }
            ChatCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            ChatCommand::PublishGlobal(content) => self.publish_global(&content),
            ChatCommand::PublishPrivate { recipient, content } => {
                self.publish_private(&recipient, &content)
            }
            ChatCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!("Publish rejected: {}", e);
            self.notify(ChatUpdate::PublishRejected(e));
        }
    }

    fn apply(&mut self, event: ConnectionEvent) {
        match self.state.transition(event) {
            Ok(next) => self.set_state(next),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!("Connection {:?} -> {:?}", self.state, next);
            self.state = next;
            self.notify(ChatUpdate::ConnectionChanged(next));
        }
    }

    fn notify(&self, update: ChatUpdate) {
        // UI が終了済みなら通知は捨てる
        let _ = self.updates.send(update);
    }

    /// イベントループ
    ///
    /// `Shutdown` を受け取るか、コマンドチャネルが閉じるまで動作し、終了時に切断する。
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ChatCommand>,
        mut session: broadcast::Receiver<SessionEvent>,
    ) {
        let mut session_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ChatCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = session.recv(), if session_open => match event {
                    Ok(event) => self.handle_session_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} session events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => session_open = false,
                },
                event = next_transport_event(&mut self.transport_events) => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => self.handle_transport_event(TransportEvent::Closed),
                },
            }
        }
        self.disconnect();
        tracing::info!("Chat service stopped");
    }

    /// 別タスクでイベントループを起動
    pub fn spawn(
        self,
        session: broadcast::Receiver<SessionEvent>,
    ) -> (ChatHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(commands_rx, session));
        (
            ChatHandle {
                commands: commands_tx,
            },
            task,
        )
    }
}

async fn next_transport_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Cloneable sender of commands into a running [`ChatService`].
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::UnboundedSender<ChatCommand>,
}

impl ChatHandle {
    /// Returns `false` once the service has stopped.
    pub fn send(&self, command: ChatCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn publish_global(&self, content: impl Into<String>) -> bool {
        self.send(ChatCommand::PublishGlobal(content.into()))
    }

    pub fn publish_private(
        &self,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> bool {
        self.send(ChatCommand::PublishPrivate {
            recipient: recipient.into(),
            content: content.into(),
        })
    }

    pub fn shutdown(&self) -> bool {
        self.send(ChatCommand::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::TransportError,
        usecase::subscription::{GLOBAL_TOPIC, private_topic},
    };
    use campus_chat_shared::time::FixedClock;
    use std::sync::Mutex;

    /// Everything the fake transport was asked to do
    #[derive(Default)]
    struct Recorded {
        opens: Vec<ConnectRequest>,
        subscribes: Vec<(String, String)>,
        publishes: Vec<(String, String)>,
        closes: usize,
        events: Option<mpsc::UnboundedSender<TransportEvent>>,
    }

    #[derive(Clone, Default)]
    struct RecordingTransport {
        log: Arc<Mutex<Recorded>>,
        refuse: bool,
    }

    struct RecordingHandle {
        log: Arc<Mutex<Recorded>>,
    }

    impl Transport for RecordingTransport {
        fn open(
            &self,
            request: ConnectRequest,
            events: mpsc::UnboundedSender<TransportEvent>,
        ) -> Result<Box<dyn TransportHandle>, TransportError> {
            if self.refuse {
                return Err(TransportError::InvalidEndpoint("refused".to_string()));
            }
            let mut log = self.log.lock().unwrap();
            log.opens.push(request);
            log.events = Some(events);
            Ok(Box::new(RecordingHandle {
                log: self.log.clone(),
            }))
        }
    }

    impl TransportHandle for RecordingHandle {
        fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError> {
            self.log
                .lock()
                .unwrap()
                .subscribes
                .push((id.to_string(), destination.to_string()));
            Ok(())
        }

        fn publish(&mut self, destination: &str, body: String) -> Result<(), TransportError> {
            self.log
                .lock()
                .unwrap()
                .publishes
                .push((destination.to_string(), body));
            Ok(())
        }

        fn close(&mut self) {
            self.log.lock().unwrap().closes += 1;
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn create_service(
        transport: &RecordingTransport,
    ) -> (ChatService, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let service = ChatService::new(
            Arc::new(transport.clone()),
            Arc::new(FixedClock::new(NOW)),
            ClientConfig::default(),
            updates_tx,
        );
        (service, updates_rx)
    }

    /// alice としてログインし、ハンドシェイクまで完了させる
    fn connected_service(
        transport: &RecordingTransport,
    ) -> (ChatService, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (mut service, updates) = create_service(transport);
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("alice")));
        service.handle_transport_event(TransportEvent::Connected);
        (service, updates)
    }

    fn global_frame(body: &str) -> TransportEvent {
        TransportEvent::Frame {
            subscription: Some("sub-1".to_string()),
            destination: GLOBAL_TOPIC.to_string(),
            body: body.to_string(),
        }
    }

    fn private_frame(body: &str) -> TransportEvent {
        TransportEvent::Frame {
            subscription: Some("sub-2".to_string()),
            destination: private_topic("alice"),
            body: body.to_string(),
        }
    }

    fn drain(updates: &mut mpsc::UnboundedReceiver<ChatUpdate>) -> Vec<ChatUpdate> {
        let mut drained = Vec::new();
        while let Ok(update) = updates.try_recv() {
            drained.push(update);
        }
        drained
    }

    #[test]
    fn test_login_opens_connection_and_handshake_subscribes() {
        // テスト項目: ログインで接続が開始され、ハンドシェイク成功で 2 つのトピックを購読する
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = create_service(&transport);

        // when (操作):
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("alice")));
        let state_after_login = service.connection_state();
        service.handle_transport_event(TransportEvent::Connected);

        // then (期待する結果):
        assert_eq!(state_after_login, ConnectionState::Connecting);
        assert_eq!(service.connection_state(), ConnectionState::Connected);
        let log = transport.log.lock().unwrap();
        assert_eq!(log.opens.len(), 1);
        assert_eq!(log.opens[0].username, "alice");
        assert_eq!(log.opens[0].reconnect_delay.as_millis(), 5000);
        assert_eq!(
            log.subscribes,
            vec![
                ("sub-1".to_string(), "/topic/global".to_string()),
                ("sub-2".to_string(), "/topic/private.alice".to_string()),
            ]
        );
    }

    #[test]
    fn test_connect_twice_is_idempotent() {
        // テスト項目: 接続済みで connect を再度呼んでもハンドシェイクや会話のリセットは起きない
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = connected_service(&transport);
        service.handle_transport_event(global_frame(
            r#"{"sender":"bob","content":"[Bob][lost] my bag","type":"CHAT"}"#,
        ));
        drain(&mut updates);

        // when (操作):
        let started = service.connect();

        // then (期待する結果):
        assert!(!started);
        assert_eq!(transport.log.lock().unwrap().opens.len(), 1);
        assert_eq!(service.conversations().global().len(), 1);
        assert!(drain(&mut updates).is_empty());
    }

    #[test]
    fn test_connect_without_identity_is_noop() {
        // テスト項目: ユーザー未設定では接続しない
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = create_service(&transport);

        // when (操作):
        let started = service.connect();

        // then (期待する結果):
        assert!(!started);
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
        assert!(transport.log.lock().unwrap().opens.is_empty());
    }

    #[test]
    fn test_refused_open_stays_disconnected() {
        // テスト項目: トランスポートが接続を拒否した場合は Disconnected のまま
        // given (前提条件):
        let transport = RecordingTransport {
            refuse: true,
            ..RecordingTransport::default()
        };
        let (mut service, _updates) = create_service(&transport);

        // when (操作):
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("alice")));

        // then (期待する結果):
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
        assert_eq!(service.identity().map(|i| i.username.as_str()), Some("alice"));
    }

    #[test]
    fn test_identity_transitions_are_mutually_exclusive() {
        // テスト項目: ログイン・ログアウトの連続で、最後のユーザーに応じた状態になる
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = connected_service(&transport);
        drain(&mut updates);

        // when (操作): ログアウト
        service.handle_session_event(SessionEvent::UserLogout);
        let after_logout = drain(&mut updates);

        // then (期待する結果): 切断のみが通知される
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
        assert_eq!(transport.log.lock().unwrap().closes, 1);
        assert!(after_logout.contains(&ChatUpdate::ConnectionChanged(
            ConnectionState::Disconnected
        )));
        assert!(!after_logout.contains(&ChatUpdate::ConnectionChanged(
            ConnectionState::Connecting
        )));

        // when (操作): 再ログイン
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("alice")));
        let after_login = drain(&mut updates);

        // then (期待する結果): 接続開始のみが通知される
        assert_eq!(service.connection_state(), ConnectionState::Connecting);
        assert_eq!(transport.log.lock().unwrap().opens.len(), 2);
        assert!(after_login.contains(&ChatUpdate::ConnectionChanged(
            ConnectionState::Connecting
        )));
        assert!(!after_login.contains(&ChatUpdate::ConnectionChanged(
            ConnectionState::Disconnected
        )));
    }

    #[test]
    fn test_login_as_other_user_reconnects() {
        // テスト項目: 別ユーザーでログインすると古い接続を閉じて新しく接続する
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = connected_service(&transport);

        // when (操作):
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("bob")));
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("bob")));

        // then (期待する結果):
        let log = transport.log.lock().unwrap();
        assert_eq!(log.closes, 1);
        assert_eq!(log.opens.len(), 2);
        assert_eq!(log.opens[1].username, "bob");
        assert_eq!(service.connection_state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_presence_frames_update_count() {
        // テスト項目: System の在席通知は件数のみ更新し、ユーザーの参加通知は会話にも追加される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = connected_service(&transport);

        // when (操作):
        service.handle_transport_event(global_frame(
            r#"{"sender":"System","type":"JOIN","content":"Online users: 5"}"#,
        ));
        let after_system = (service.presence(), service.conversations().global().len());
        service.handle_transport_event(global_frame(
            r#"{"sender":"alice","type":"JOIN","content":"alice joined the chat. Online users: 6"}"#,
        ));

        // then (期待する結果):
        assert_eq!(after_system, (5, 0));
        assert_eq!(service.presence(), 6);
        assert_eq!(service.conversations().global().len(), 1);
    }

    #[test]
    fn test_private_echo_is_deduplicated() {
        // テスト項目: 楽観的エコーの後にサーバーから同じメッセージが届いても重複しない
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = connected_service(&transport);
        drain(&mut updates);

        // when (操作):
        service.publish_private("bob", "hi").unwrap();
        let local = service.conversations().private("bob").to_vec();
        service.handle_transport_event(private_frame(
            r#"{"sender":"alice","recipient":"bob","content":"hi","type":"CHAT","timestamp":"2024-05-01T10:00:00Z"}"#,
        ));
        service.handle_transport_event(private_frame(
            r#"{"sender":"bob","recipient":"alice","content":"hello!","type":"CHAT"}"#,
        ));

        // then (期待する結果):
        assert_eq!(local.len(), 1);
        assert_eq!(
            local[0].timestamp,
            Some(MessageTimestamp::Text("2023-11-14T22:13:20.000Z".to_string()))
        );
        let conversation = service.conversations().private("bob");
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[1].content, "hello!");
        assert_eq!(service.conversations().peers(), ["bob".to_string()]);

        let log = transport.log.lock().unwrap();
        assert_eq!(log.publishes.len(), 1);
        assert_eq!(log.publishes[0].0, "/app/chat.sendPrivateMessage");
        assert_eq!(
            log.publishes[0].1,
            r#"{"content":"hi","recipient":"bob","type":"CHAT","sender":"alice"}"#
        );
    }

    #[test]
    fn test_reconnect_resets_conversations_and_presence() {
        // テスト項目: 再接続のハンドシェイク成功で全会話と在席数がリセットされる
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = connected_service(&transport);
        service.handle_transport_event(global_frame(
            r#"{"sender":"System","type":"JOIN","content":"Online users: 3"}"#,
        ));
        service.handle_transport_event(global_frame(
            r#"{"sender":"bob","type":"CHAT","content":"anyone seen a red umbrella?"}"#,
        ));
        service.handle_transport_event(private_frame(
            r#"{"sender":"bob","recipient":"alice","content":"hey","type":"CHAT"}"#,
        ));
        service.handle_transport_event(private_frame(
            r#"{"sender":"carol","recipient":"alice","content":"found it","type":"CHAT"}"#,
        ));

        // when (操作): 接続断のあと自動再接続
        service.handle_transport_event(TransportEvent::TransportError("reset".to_string()));
        let presence_while_down = service.presence();
        service.handle_transport_event(TransportEvent::Connected);

        // then (期待する結果):
        assert_eq!(presence_while_down, 3);
        assert!(service.conversations().is_empty());
        assert!(service.conversations().private("bob").is_empty());
        assert!(service.conversations().private("carol").is_empty());
        assert_eq!(service.presence(), 0);
        assert_eq!(service.connection_state(), ConnectionState::Connected);
        assert_eq!(transport.log.lock().unwrap().opens.len(), 1);
    }

    #[test]
    fn test_peerless_private_frames_create_no_conversation() {
        // テスト項目: 会話相手が決まらない個人フレームでは会話が作られない
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = connected_service(&transport);
        drain(&mut updates);

        // when (操作):
        for body in [
            r#"{"sender":"alice","content":"x","type":"CHAT"}"#,
            r#"{"sender":"","recipient":"bob","content":"x","type":"CHAT"}"#,
            r#"{"sender":"alice","recipient":"","content":"x","type":"CHAT"}"#,
        ] {
            service.handle_transport_event(private_frame(body));
        }

        // then (期待する結果):
        assert!(service.conversations().peers().is_empty());
        assert!(service.conversations().is_empty());
        assert!(drain(&mut updates).is_empty());
    }

    /// 接続済みで、グローバルと bob との会話があり、在席数が 7 のサービス
    fn populated_service(
        transport: &RecordingTransport,
    ) -> (ChatService, mpsc::UnboundedReceiver<ChatUpdate>) {
        let (mut service, mut updates) = connected_service(transport);
        service.handle_transport_event(global_frame(
            r#"{"sender":"System","type":"JOIN","content":"Online users: 7"}"#,
        ));
        service.handle_transport_event(global_frame(
            r#"{"sender":"bob","type":"CHAT","content":"[Bob][lost] black backpack"}"#,
        ));
        service.publish_private("bob", "hi").unwrap();
        drain(&mut updates);
        (service, updates)
    }

    #[test]
    fn test_logout_clears_conversations_but_keeps_presence() {
        // テスト項目: ログアウトで全会話がクリアされるが、在席数は保持される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = populated_service(&transport);
        let populated = (
            service.conversations().global().len(),
            service.conversations().peers().to_vec(),
        );

        // when (操作):
        service.handle_session_event(SessionEvent::UserLogout);

        // then (期待する結果):
        assert_eq!(populated, (1, vec!["bob".to_string()]));
        assert!(service.conversations().is_empty());
        assert_eq!(service.presence(), 7);
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
        assert!(drain(&mut updates).contains(&ChatUpdate::Cleared));
    }

    #[test]
    fn test_disconnect_command_clears_conversations_but_keeps_presence() {
        // テスト項目: Disconnect コマンドで全会話がクリアされるが、在席数は保持される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = populated_service(&transport);

        // when (操作):
        service.handle_command(ChatCommand::Disconnect);

        // then (期待する結果):
        assert!(service.conversations().is_empty());
        assert!(service.conversations().private("bob").is_empty());
        assert_eq!(service.presence(), 7);
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
        assert_eq!(transport.log.lock().unwrap().closes, 1);
        let drained = drain(&mut updates);
        assert!(drained.contains(&ChatUpdate::Cleared));
        assert!(!drained.contains(&ChatUpdate::PresenceChanged(0)));
    }

    #[test]
    fn test_publish_preconditions() {
        // テスト項目: 未接続・空文字・宛先なしの送信は拒否される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = create_service(&transport);
        service.handle_session_event(SessionEvent::UserLogin(UserIdentity::student("alice")));

        // when (操作):
        let while_connecting = service.publish_global("hello");
        service.handle_transport_event(TransportEvent::Connected);
        let blank = service.publish_global("   ");
        let no_recipient = service.publish_private(" ", "hi");
        let ok = service.publish_global("[Alice][found] blue wallet at library");

        // then (期待する結果):
        assert_eq!(while_connecting, Err(PublishError::NotConnected));
        assert_eq!(blank, Err(PublishError::EmptyContent));
        assert_eq!(no_recipient, Err(PublishError::EmptyRecipient));
        assert_eq!(ok, Ok(()));
        let log = transport.log.lock().unwrap();
        assert_eq!(log.publishes.len(), 1);
        assert_eq!(log.publishes[0].0, "/app/chat.sendMessage");
    }

    #[test]
    fn test_protocol_error_then_socket_loss() {
        // テスト項目: ERROR フレームで Erroring になり、ソケット断で Disconnected になる
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, _updates) = connected_service(&transport);

        // when (操作):
        service.handle_transport_event(TransportEvent::ProtocolError("bad destination".into()));
        let erroring = service.connection_state();
        let publish = service.publish_global("hello");
        service.handle_transport_event(TransportEvent::TransportError("closed".into()));

        // then (期待する結果):
        assert_eq!(erroring, ConnectionState::Erroring);
        assert_eq!(publish, Err(PublishError::NotConnected));
        assert_eq!(service.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_rejected_command_is_reported() {
        // テスト項目: 拒否された送信コマンドは PublishRejected として通知される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (mut service, mut updates) = create_service(&transport);

        // when (操作):
        service.handle_command(ChatCommand::PublishGlobal("hello".to_string()));

        // then (期待する結果):
        assert_eq!(
            drain(&mut updates),
            vec![ChatUpdate::PublishRejected(PublishError::NotConnected)]
        );
    }

    #[tokio::test]
    async fn test_run_loop_routes_all_inputs() {
        // テスト項目: イベントループがセッション・トランスポート・コマンドを処理し、終了時に切断する
        // given (前提条件):
        let transport = RecordingTransport::default();
        let (service, mut updates) = create_service(&transport);
        let (session_tx, session_rx) = broadcast::channel(4);
        let (handle, task) = service.spawn(session_rx);

        // when (操作): ログイン → ハンドシェイク → 受信 → 終了
        session_tx
            .send(SessionEvent::UserLogin(UserIdentity::student("alice")))
            .unwrap();
        loop {
            let update = updates.recv().await;
            if update == Some(ChatUpdate::ConnectionChanged(ConnectionState::Connecting)) {
                break;
            }
        }
        let events = transport.log.lock().unwrap().events.clone().unwrap();
        events.send(TransportEvent::Connected).unwrap();
        events
            .send(global_frame(r#"{"sender":"bob","type":"CHAT","content":"hi all"}"#))
            .unwrap();
        let received = loop {
            if let Some(ChatUpdate::GlobalMessage(message)) = updates.recv().await {
                break message;
            }
        };
        assert!(handle.shutdown());
        task.await.unwrap();

        // then (期待する結果):
        assert_eq!(received, ChatMessage::global("bob", "hi all"));
        assert_eq!(transport.log.lock().unwrap().closes, 1);
    }
}
