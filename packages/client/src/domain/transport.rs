//! Transport trait 定義
//!
//! リアルタイム接続（publish-subscribe）のインターフェースです。
//! Chat Service はこの trait にのみ依存し、STOMP/WebSocket の実装には依存しません。

use std::time::Duration;

use tokio::sync::mpsc;

use super::TransportError;

/// Parameters for opening a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Sent as the `username` query parameter and as a connect-time header
    pub username: String,
    pub reconnect_delay: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
}

/// Events the transport reports back to the service event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A handshake completed. Emitted again after every automatic reconnect.
    Connected,
    /// A MESSAGE frame arrived on a subscription
    Frame {
        subscription: Option<String>,
        destination: String,
        body: String,
    },
    /// The broker sent an ERROR frame
    ProtocolError(String),
    /// The socket failed or the handshake was refused; the transport will retry
    TransportError(String),
    /// The transport stopped for good
    Closed,
}

/// Opens connections.
pub trait Transport: Send + Sync {
    /// Start connecting in the background.
    ///
    /// Progress is reported on `events`; the returned handle owns the connection.
    fn open(
        &self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;
}

/// A live connection. Every operation is fire-and-forget.
pub trait TransportHandle: Send {
    fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError>;

    fn publish(&mut self, destination: &str, body: String) -> Result<(), TransportError>;

    /// Tear the connection down and stop reconnecting.
    fn close(&mut self);
}
