//! Stream-based transport.
//!
//! Exchanges newline-delimited JSON [`Frame`]s over an async byte stream.
//! This is useful for TCP bridges and for piping recorded sessions into the
//! monitor.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ChannelEvent, EventReceiver, Frame, OutboundEvent, Transport, EVENT_BUFFER};
use crate::error::TransportError;

/// A transport that speaks newline-delimited JSON over an async stream.
///
/// The reader task reports [`ChannelEvent::Connected`] as soon as it starts
/// and [`ChannelEvent::Disconnected`] on EOF or a read error. Lines that are
/// not valid frames are logged and skipped.
///
/// # Example
///
/// ```
/// use level_monitor::StreamTransport;
///
/// # tokio_test::block_on(async {
/// let (client, _server) = tokio::io::duplex(1024);
/// let (transport, events) = StreamTransport::spawn(client, "example");
/// # drop((transport, events));
/// # });
/// ```
#[derive(Debug)]
pub struct StreamTransport {
    sender: mpsc::UnboundedSender<String>,
    description: String,
}

impl StreamTransport {
    /// Spawn reader and writer tasks for the given stream.
    pub fn spawn<S>(stream: S, description: &str) -> (Self, EventReceiver)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let desc = description.to_string();

        tokio::spawn(async move {
            if event_tx.send(ChannelEvent::Connected).await.is_err() {
                return;
            }

            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("{}: connection closed", desc);
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Frame>(trimmed) {
                            Ok(frame) => {
                                if let Some(event) = frame.into_channel_event() {
                                    if event_tx.send(event).await.is_err() {
                                        // Receiver dropped
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("{}: skipping malformed frame: {}", desc, e);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("{}: read error: {}", desc, e);
                        break;
                    }
                }
            }

            let _ = event_tx.send(ChannelEvent::Disconnected).await;
        });

        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    warn!("stream write failed: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    warn!("stream flush failed: {}", e);
                    break;
                }
            }
        });

        let transport = Self {
            sender: line_tx,
            description: format!("stream: {}", description),
        };
        (transport, event_rx)
    }

    /// Connect to a TCP endpoint speaking the line protocol.
    pub async fn connect<A>(
        addr: A,
        description: &str,
    ) -> Result<(Self, EventReceiver), TransportError>
    where
        A: ToSocketAddrs,
    {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::spawn(stream, description))
    }
}

impl Transport for StreamTransport {
    fn emit(&self, event: OutboundEvent) -> Result<(), TransportError> {
        let frame = Frame::from_outbound(&event)?;
        let mut line = serde_json::to_string(&frame)?;
        line.push('\n');
        self.sender.send(line).map_err(|_| TransportError::Closed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
