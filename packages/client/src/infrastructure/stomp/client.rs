//! WebSocket を使った Transport 実装
//!
//! ## 責務
//!
//! - WebSocket 接続と STOMP ハンドシェイク（CONNECT / CONNECTED）
//! - SUBSCRIBE / SEND フレームの送信、MESSAGE / ERROR フレームの受信
//! - heart-beat の送信と受信監視
//! - 接続断時の自動再接続（固定の待ち時間）
//!
//! 接続ごとのタスクは `open` で生成され、`StompHandle` を通じて操作されます。
//! 受信したイベントは全て `TransportEvent` として Chat Service のイベントループに送られます。

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};
use url::Url;

use crate::domain::{ConnectRequest, Transport, TransportError, TransportEvent, TransportHandle};

use super::{
    frame::{Command, Frame, decode_message},
    heartbeat::{self, Heartbeat},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the WebSocket upgrade plus the STOMP handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Path segment under which a SockJS endpoint serves raw WebSocket
const RAW_WEBSOCKET_SEGMENT: &str = "websocket";

/// Transport over STOMP/WebSocket with fallback endpoint candidates.
#[derive(Debug, Clone)]
pub struct StompTransport {
    endpoint: Url,
}

impl StompTransport {
    /// `endpoint` is the WebSocket base, e.g. `ws://localhost:9999/ws`.
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| TransportError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") || endpoint.host_str().is_none() {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self { endpoint })
    }

    /// Candidate URLs in preference order, each carrying `?username=<username>`.
    ///
    /// The raw WebSocket path of a SockJS endpoint comes first, the bare endpoint second.
    pub fn candidate_urls(&self, username: &str) -> Result<Vec<Url>, TransportError> {
        let mut raw = self.endpoint.clone();
        raw.path_segments_mut()
            .map_err(|_| TransportError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(RAW_WEBSOCKET_SEGMENT);

        let candidates = [raw, self.endpoint.clone()]
            .into_iter()
            .map(|mut url| {
                url.query_pairs_mut().append_pair("username", username);
                url
            })
            .collect();
        Ok(candidates)
    }
}

impl Transport for StompTransport {
    fn open(
        &self,
        request: ConnectRequest,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connection(format!("no async runtime: {}", e)))?;
        let urls = self.candidate_urls(&request.username)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tracing::info!("Opening STOMP transport for '{}'", request.username);
        runtime.spawn(connection_loop(urls, request, outbound_rx, events));

        Ok(Box::new(StompHandle {
            outbound: outbound_tx,
        }))
    }
}

/// Requests from the handle to the connection task
#[derive(Debug)]
enum Outbound {
    Frame(Frame),
    Close,
}

/// Handle to a running connection task
pub struct StompHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl StompHandle {
    fn enqueue(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }
}

impl TransportHandle for StompHandle {
    fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError> {
        self.enqueue(Frame::subscribe(id, destination))
    }

    fn publish(&mut self, destination: &str, body: String) -> Result<(), TransportError> {
        self.enqueue(Frame::send_json(destination, body))
    }

    fn close(&mut self) {
        if self.outbound.send(Outbound::Close).is_err() {
            tracing::debug!("STOMP connection task already stopped");
        }
    }
}

/// How one connected session ended
#[derive(Debug)]
enum SessionEnd {
    /// Closed on request; do not reconnect
    Closed,
    /// Lost; reconnect after the delay
    Failed(TransportError),
}

/// Connect, run the session, and reconnect after failures until closed.
async fn connection_loop(
    urls: Vec<Url>,
    request: ConnectRequest,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        if !discard_stale(&mut outbound) {
            break;
        }

        match run_session(&urls, &request, &mut outbound, &events).await {
            SessionEnd::Closed => break,
            SessionEnd::Failed(e) => {
                tracing::warn!(
                    "STOMP connection lost: {}. Reconnecting in {} ms",
                    e,
                    request.reconnect_delay.as_millis()
                );
                if events.send(TransportEvent::TransportError(e.to_string())).is_err() {
                    tracing::debug!("Event receiver dropped, stopping transport");
                    return;
                }
            }
        }

        if !wait_reconnect(request.reconnect_delay, &mut outbound).await {
            break;
        }
    }

    tracing::info!("STOMP transport closed");
    let _ = events.send(TransportEvent::Closed);
}

/// Drop frames queued while the socket was down. Returns `false` when a close was requested.
fn discard_stale(outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> bool {
    loop {
        match outbound.try_recv() {
            Ok(Outbound::Frame(frame)) => {
                tracing::debug!("Discarding stale {} frame", frame.command);
            }
            Ok(Outbound::Close) | Err(mpsc::error::TryRecvError::Disconnected) => return false,
            Err(mpsc::error::TryRecvError::Empty) => return true,
        }
    }
}

/// Sleep for the reconnect delay. Returns `false` when a close was requested meanwhile.
async fn wait_reconnect(delay: Duration, outbound: &mut mpsc::UnboundedReceiver<Outbound>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            request = outbound.recv() => match request {
                Some(Outbound::Frame(frame)) => {
                    tracing::debug!("Not connected, dropping {} frame", frame.command);
                }
                Some(Outbound::Close) | None => return false,
            },
        }
    }
}

async fn run_session(
    urls: &[Url],
    request: &ConnectRequest,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd {
    let (ws, url) = match connect_first(urls).await {
        Ok(connected) => connected,
        Err(e) => return SessionEnd::Failed(e),
    };
    let (mut sink, mut stream) = ws.split();

    let host = url.host_str().unwrap_or("localhost").to_string();
    let offer = heartbeat::offer(request.heartbeat_outgoing, request.heartbeat_incoming);
    let connect = Frame::connect(&host, &request.username, &offer);
    if let Err(e) = sink.send(Message::Text(connect.encode().into())).await {
        return SessionEnd::Failed(TransportError::Connection(e.to_string()));
    }

    let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connected(&mut stream));
    let connected = match handshake.await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => return SessionEnd::Failed(e),
        Err(_) => {
            return SessionEnd::Failed(TransportError::Handshake(
                "timed out waiting for CONNECTED".to_string(),
            ));
        }
    };

    let heartbeat = heartbeat::negotiate(
        request.heartbeat_outgoing,
        request.heartbeat_incoming,
        connected.get_header("heart-beat"),
    );
    tracing::info!("STOMP session established at {} ({:?})", url, heartbeat);
    if events.send(TransportEvent::Connected).is_err() {
        return SessionEnd::Closed;
    }

    let Heartbeat { outgoing, .. } = heartbeat;
    let deadline = heartbeat.incoming_deadline();
    let tick_period = outgoing.unwrap_or(Duration::from_secs(3600));
    let mut ticker = tokio::time::interval_at(Instant::now() + tick_period, tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        let silence_limit = last_seen + deadline.unwrap_or(Duration::from_secs(3600));

        tokio::select! {
            message = stream.next() => {
                last_seen = Instant::now();
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(end) = dispatch_text(text.as_str(), events) {
                            return end;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if let Some(end) = dispatch_text(text, events) {
                                return end;
                            }
                        }
                        Err(_) => tracing::warn!(
                            "Dropping non-UTF-8 binary message ({} bytes)",
                            data.len()
                        ),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Failed(TransportError::Connection(
                            "closed by server".to_string(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return SessionEnd::Failed(TransportError::Connection(e.to_string()));
                    }
                }
            }
            request = outbound.recv() => match request {
                Some(Outbound::Frame(frame)) => {
                    tracing::debug!("Sending {} frame", frame.command);
                    if let Err(e) = sink.send(Message::Text(frame.encode().into())).await {
                        return SessionEnd::Failed(TransportError::Connection(e.to_string()));
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Text(Frame::disconnect().encode().into())).await;
                    let _ = sink.close().await;
                    return SessionEnd::Closed;
                }
            },
            _ = ticker.tick(), if outgoing.is_some() => {
                if let Err(e) = sink.send(Message::Text(String::from("\n").into())).await {
                    return SessionEnd::Failed(TransportError::Connection(e.to_string()));
                }
            }
            _ = tokio::time::sleep_until(silence_limit), if deadline.is_some() => {
                let millis = deadline.map(|d| d.as_millis() as u64).unwrap_or_default();
                return SessionEnd::Failed(TransportError::HeartbeatTimeout(millis));
            }
        }
    }
}

/// Try each candidate URL in order and keep the first that upgrades.
async fn connect_first(urls: &[Url]) -> Result<(WsStream, Url), TransportError> {
    let mut last_error = TransportError::InvalidEndpoint("no candidate URL".to_string());

    for url in urls {
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                tracing::debug!("WebSocket upgraded at {}", url);
                return Ok((ws, url.clone()));
            }
            Ok(Err(e)) => {
                tracing::debug!("WebSocket upgrade failed at {}: {}", url, e);
                last_error = TransportError::Connection(e.to_string());
            }
            Err(_) => {
                tracing::debug!("WebSocket upgrade timed out at {}", url);
                last_error = TransportError::Connection(format!("upgrade timed out at {}", url));
            }
        }
    }

    Err(last_error)
}

/// Read until the broker answers CONNECT.
async fn await_connected<S>(stream: &mut S) -> Result<Frame, TransportError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(TransportError::Connection(e.to_string())),
        };

        let frames =
            decode_message(&text).map_err(|e| TransportError::Handshake(e.to_string()))?;
        for frame in frames {
            match frame.command {
                Command::Connected => return Ok(frame),
                Command::Error => {
                    let reason = frame.get_header("message").unwrap_or(&frame.body).to_string();
                    return Err(TransportError::Handshake(reason));
                }
                other => tracing::debug!("Ignoring {} frame before CONNECTED", other),
            }
        }
    }

    Err(TransportError::Handshake("connection closed before CONNECTED".to_string()))
}

/// Forward the frames of one inbound message. Returns `Some` when the session must end.
fn dispatch_text(
    text: &str,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<SessionEnd> {
    let frames = match decode_message(text) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!("Dropping undecodable STOMP message: {}", e);
            return None;
        }
    };

    for frame in frames {
        let event = match frame.command {
            Command::Message => {
                let Some(destination) = frame.get_header("destination") else {
                    tracing::warn!("Dropping MESSAGE frame without destination");
                    continue;
                };
                TransportEvent::Frame {
                    subscription: frame.get_header("subscription").map(str::to_string),
                    destination: destination.to_string(),
                    body: frame.body.clone(),
                }
            }
            Command::Error => {
                let reason = frame.get_header("message").unwrap_or(&frame.body).to_string();
                tracing::warn!("STOMP error from broker: {}", reason);
                if events.send(TransportEvent::ProtocolError(reason.clone())).is_err() {
                    return Some(SessionEnd::Closed);
                }
                return Some(SessionEnd::Failed(TransportError::Connection(format!(
                    "broker error: {}",
                    reason
                ))));
            }
            other => {
                tracing::debug!("Ignoring {} frame", other);
                continue;
            }
        };

        if events.send(event).is_err() {
            return Some(SessionEnd::Closed);
        }
    }

    None
}
