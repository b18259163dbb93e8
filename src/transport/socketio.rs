//! Socket.IO transport over WebSocket.
//!
//! Speaks just enough of Engine.IO v4 and Socket.IO v5 to join the default
//! namespace, answer heartbeats, receive events and emit them. Polling
//! fallback, acknowledgements and binary attachments are not supported.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{ChannelEvent, EventReceiver, Frame, OutboundEvent, Transport, EVENT_BUFFER};
use crate::error::TransportError;

/// Default Socket.IO endpoint path.
pub const DEFAULT_PATH: &str = "/socket.io/";

/// Ping interval assumed when the handshake does not announce one.
const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;

/// Ping timeout assumed when the handshake does not announce one.
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

/// Connection options for [`SocketIoTransport`].
#[derive(Debug, Clone)]
pub struct SocketIoOptions {
    /// Endpoint path on the server.
    pub path: String,
    /// Delay before reconnecting after a failure or disconnect.
    /// `None` stops the transport after the first session ends.
    pub reconnect_delay: Option<Duration>,
}

impl Default for SocketIoOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            reconnect_delay: Some(Duration::from_secs(1)),
        }
    }
}

/// A Socket.IO client connection.
///
/// Emits made while the socket is not (yet) joined are buffered and flushed
/// once the namespace handshake completes.
#[derive(Debug)]
pub struct SocketIoTransport {
    sender: mpsc::UnboundedSender<String>,
    description: String,
}

impl SocketIoTransport {
    /// Start connecting to the server at `base_url` (e.g.
    /// `http://localhost:3000`).
    ///
    /// Returns the transport, the inbound event receiver and the handle of
    /// the background connection task. Connection failures are reported as
    /// [`ChannelEvent::ConnectFailed`], not as an error here.
    pub fn connect(
        base_url: &str,
        options: SocketIoOptions,
    ) -> Result<(Self, EventReceiver, JoinHandle<()>), TransportError> {
        let url = socket_url(base_url, &options.path)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(url, options.reconnect_delay, event_tx, out_rx));

        let transport = Self {
            sender: out_tx,
            description: format!("socket.io: {}", base_url),
        };
        Ok((transport, event_rx, handle))
    }
}

impl Transport for SocketIoTransport {
    fn emit(&self, event: OutboundEvent) -> Result<(), TransportError> {
        let frame = Frame::from_outbound(&event)?;
        let text = encode_event(&frame)?;
        self.sender.send(text).map_err(|_| TransportError::Closed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Build the WebSocket URL from an HTTP(S) or WS(S) base address.
pub fn socket_url(base_url: &str, path: &str) -> Result<String, TransportError> {
    let base = base_url.trim().trim_end_matches('/');
    let (scheme, rest) = base
        .split_once("://")
        .ok_or_else(|| TransportError::InvalidEndpoint(base_url.to_string()))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(TransportError::InvalidEndpoint(base_url.to_string())),
    };
    if rest.is_empty() {
        return Err(TransportError::InvalidEndpoint(base_url.to_string()));
    }

    let path = format!("/{}/", path.trim_matches('/'));
    Ok(format!(
        "{}://{}{}?EIO=4&transport=websocket",
        ws_scheme, rest, path
    ))
}

/// Heartbeat timing announced by the server in the open packet.
///
/// The server pings every `interval`; a session that has not seen a ping
/// for `interval + timeout` is considered dead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Heartbeat {
    interval: Duration,
    timeout: Duration,
}

impl Heartbeat {
    pub(crate) fn from_handshake(handshake: &Value) -> Self {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(handshake.get(key).and_then(Value::as_u64).unwrap_or(default))
        };
        Self {
            interval: millis("pingInterval", DEFAULT_PING_INTERVAL_MS),
            timeout: millis("pingTimeout", DEFAULT_PING_TIMEOUT_MS),
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.interval + self.timeout
    }
}

/// A decoded Engine.IO / Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Packet {
    Open(Value),
    Close,
    Ping,
    Pong,
    Connect,
    ConnectError(String),
    Disconnect,
    Event(Frame),
    Other,
}

/// Decode a text frame.
pub(crate) fn decode_packet(text: &str) -> Result<Packet, TransportError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| TransportError::Protocol("empty packet".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => {
            let handshake = if rest.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(rest)
                    .map_err(|e| TransportError::Protocol(format!("bad open packet: {}", e)))?
            };
            Ok(Packet::Open(handshake))
        }
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(rest),
        '6' => Ok(Packet::Other),
        other => Err(TransportError::Protocol(format!(
            "unknown engine packet type {:?}",
            other
        ))),
    }
}

/// Split an optional `/nsp,` prefix off a message body.
///
/// Returns an empty namespace for the default one (no prefix or `/,`).
fn split_namespace(rest: &str) -> (&str, &str) {
    match rest.strip_prefix('/') {
        Some(tail) => tail.split_once(',').unwrap_or((tail, "")),
        None => ("", rest),
    }
}

fn decode_message(body: &str) -> Result<Packet, TransportError> {
    let mut chars = body.chars();
    let Some(kind) = chars.next() else {
        return Ok(Packet::Other);
    };
    let (namespace, rest) = split_namespace(chars.as_str());
    if !namespace.is_empty() {
        return Ok(Packet::Other);
    }

    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            // An optional ack id precedes the JSON array.
            let start = rest
                .find('[')
                .ok_or_else(|| TransportError::Protocol("event without payload".to_string()))?;
            let args: Vec<Value> = serde_json::from_str(&rest[start..])
                .map_err(|e| TransportError::Protocol(format!("bad event payload: {}", e)))?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(TransportError::Protocol("event without name".to_string())),
            };
            Ok(Packet::Event(Frame::new(name, args.next().unwrap_or(Value::Null))))
        }
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            Ok(Packet::ConnectError(message))
        }
        _ => Ok(Packet::Other),
    }
}

/// Encode a frame as a Socket.IO EVENT message.
pub(crate) fn encode_event(frame: &Frame) -> Result<String, serde_json::Error> {
    let args = serde_json::to_string(&[Value::String(frame.event.clone()), frame.data.clone()])?;
    Ok(format!("42{}", args))
}

/// How a single WebSocket session ended.
enum SessionEnd {
    /// The socket closed after (or before) joining the namespace.
    Closed { joined: bool },
    /// The server refused the namespace connection.
    Refused,
    /// The transport handle was dropped.
    Shutdown,
    /// Nobody is listening for inbound events anymore.
    ReceiverGone,
}

async fn run(
    url: String,
    reconnect_delay: Option<Duration>,
    events: mpsc::Sender<ChannelEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    loop {
        info!(url = %url, "Connecting to Socket.IO server");

        let end = match connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => run_session(ws_stream, &events, &mut outbound).await,
            Err(e) => {
                let error = TransportError::from(e);
                warn!(%error, "Socket.IO connection failed");
                SessionEnd::Closed { joined: false }
            }
        };

        let notify = match end {
            SessionEnd::Shutdown | SessionEnd::ReceiverGone => return,
            SessionEnd::Closed { joined: true } => Some(ChannelEvent::Disconnected),
            SessionEnd::Closed { joined: false } => Some(ChannelEvent::ConnectFailed),
            // Already reported inside the session.
            SessionEnd::Refused => None,
        };
        if let Some(event) = notify {
            if events.send(event).await.is_err() {
                return;
            }
        }

        match reconnect_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => return,
        }
        if outbound.is_closed() {
            return;
        }
    }
}

async fn run_session<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    events: &mpsc::Sender<ChannelEvent>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();
    let mut joined = false;
    let mut heartbeat: Option<Heartbeat> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Server closed WebSocket");
                        return SessionEnd::Closed { joined };
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let error = TransportError::from(e);
                        warn!(%error, "WebSocket receive error");
                        return SessionEnd::Closed { joined };
                    }
                    None => return SessionEnd::Closed { joined },
                };

                let packet = match decode_packet(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(error = %e, raw = %text, "Ignoring malformed packet");
                        continue;
                    }
                };

                let reply = match packet {
                    Packet::Open(handshake) => {
                        debug!(%handshake, "Engine.IO handshake");
                        let timing = Heartbeat::from_handshake(&handshake);
                        heartbeat = Some(timing);
                        deadline = Some(timing.deadline());
                        Some("40".to_string())
                    }
                    Packet::Ping => {
                        deadline = heartbeat.map(|timing| timing.deadline());
                        Some("3".to_string())
                    }
                    Packet::Connect => {
                        joined = true;
                        if events.send(ChannelEvent::Connected).await.is_err() {
                            return SessionEnd::ReceiverGone;
                        }
                        None
                    }
                    Packet::ConnectError(message) => {
                        warn!(%message, "Namespace connection refused");
                        if events.send(ChannelEvent::ConnectFailed).await.is_err() {
                            return SessionEnd::ReceiverGone;
                        }
                        return SessionEnd::Refused;
                    }
                    Packet::Close | Packet::Disconnect => {
                        return SessionEnd::Closed { joined };
                    }
                    Packet::Event(frame) => {
                        if let Some(event) = frame.into_channel_event() {
                            if events.send(event).await.is_err() {
                                return SessionEnd::ReceiverGone;
                            }
                        }
                        None
                    }
                    Packet::Pong | Packet::Other => None,
                };

                if let Some(reply) = reply {
                    if let Err(e) = sink.send(Message::Text(reply)).await {
                        warn!(error = %e, "WebSocket send error");
                        return SessionEnd::Closed { joined };
                    }
                }
            }
            out = outbound.recv(), if joined => {
                match out {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            warn!(error = %e, "Failed to emit event");
                            return SessionEnd::Closed { joined };
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Text("41".to_string())).await;
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                warn!("No ping from server within the heartbeat timeout");
                return SessionEnd::Closed { joined };
            }
        }
    }
}
