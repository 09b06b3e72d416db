//! Connection lifecycle state machine.

use super::TransitionError;

/// State of the single real-time connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// A protocol-level ERROR frame arrived; the socket has not been reported lost yet.
    Erroring,
}

/// Inputs of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// A connect was requested and the transport is opening
    Open,
    /// The STOMP handshake completed (first connect or automatic reconnect)
    HandshakeSucceeded,
    /// The socket failed or the handshake was refused
    TransportFailed,
    /// The broker sent an ERROR frame
    ProtocolFailed,
    /// The connection was torn down on request
    Closed,
}

impl ConnectionState {
    /// Apply an event and return the next state.
    ///
    /// `HandshakeSucceeded` is accepted from `Disconnected` and `Erroring`
    /// because the transport reconnects on its own.
    pub fn transition(self, event: ConnectionEvent) -> Result<Self, TransitionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (S::Disconnected, E::Open) => Ok(S::Connecting),
            (S::Disconnected | S::Connecting | S::Erroring, E::HandshakeSucceeded) => {
                Ok(S::Connected)
            }
            (S::Connecting | S::Connected | S::Erroring, E::ProtocolFailed) => Ok(S::Erroring),
            (_, E::TransportFailed | E::Closed) => Ok(S::Disconnected),
            (from, event) => Err(TransitionError { from, event }),
        }
    }

    /// Publishing is only permitted in this state.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether a connect request must be ignored.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Connecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ConnectionEvent as E;
    use ConnectionState as S;

    #[test]
    fn test_open_from_disconnected_enters_connecting() {
        // テスト項目: 切断状態で Open すると Connecting に遷移する
        // given (前提条件):
        let state = S::Disconnected;

        // when (操作):
        let next = state.transition(E::Open);

        // then (期待する結果):
        assert_eq!(next, Ok(S::Connecting));
    }

    #[test]
    fn test_handshake_from_connecting_enters_connected() {
        // テスト項目: ハンドシェイク成功で Connected に遷移する
        // given (前提条件):
        let state = S::Connecting;

        // when (操作):
        let next = state.transition(E::HandshakeSucceeded);

        // then (期待する結果):
        assert_eq!(next, Ok(S::Connected));
        assert!(next.unwrap().is_connected());
    }

    #[test]
    fn test_open_while_connected_is_rejected() {
        // テスト項目: 接続済みでの Open は不正な遷移として拒否される
        // given (前提条件):
        let state = S::Connected;

        // when (操作):
        let next = state.transition(E::Open);

        // then (期待する結果):
        assert_eq!(
            next,
            Err(TransitionError {
                from: S::Connected,
                event: E::Open
            })
        );
    }

    #[test]
    fn test_transport_failure_always_disconnects() {
        // テスト項目: どの状態でもトランスポート障害で Disconnected になる
        // given (前提条件):
        let states = [S::Disconnected, S::Connecting, S::Connected, S::Erroring];

        // when (操作):
        let results: Vec<_> = states
            .iter()
            .map(|s| s.transition(E::TransportFailed))
            .collect();

        // then (期待する結果):
        assert!(results.iter().all(|r| *r == Ok(S::Disconnected)));
    }

    #[test]
    fn test_protocol_failure_enters_erroring_and_blocks_publish() {
        // テスト項目: ERROR フレームで Erroring に遷移し、送信は許可されない
        // given (前提条件):
        let state = S::Connected;

        // when (操作):
        let next = state.transition(E::ProtocolFailed).unwrap();

        // then (期待する結果):
        assert_eq!(next, S::Erroring);
        assert!(!next.is_connected());
    }

    #[test]
    fn test_automatic_reconnect_from_disconnected() {
        // テスト項目: 自動再接続によるハンドシェイク成功は Disconnected からも受け付ける
        // given (前提条件):
        let state = S::Connected.transition(E::TransportFailed).unwrap();

        // when (操作):
        let next = state.transition(E::HandshakeSucceeded);

        // then (期待する結果):
        assert_eq!(next, Ok(S::Connected));
    }

    #[test]
    fn test_protocol_failure_while_disconnected_is_rejected() {
        // テスト項目: 切断中の ERROR フレームは不正な遷移になる
        // given (前提条件):
        let state = S::Disconnected;

        // when (操作):
        let next = state.transition(E::ProtocolFailed);

        // then (期待する結果):
        assert!(next.is_err());
    }
}
