//! In-memory channel transport.
//!
//! Connects a monitor to another task in the same process. The peer pushes
//! [`ChannelEvent`]s and receives every [`OutboundEvent`] the monitor emits.
//! This is what embedders use when they own the real connection, and what
//! the tests use as a transport double.

use tokio::sync::mpsc;

use super::{ChannelEvent, EventReceiver, OutboundEvent, Transport, EVENT_BUFFER};
use crate::error::TransportError;

/// A transport backed by tokio channels.
///
/// # Example
///
/// ```
/// use level_monitor::{ChannelTransport, LevelMonitor, Thresholds};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let (transport, peer, events) = ChannelTransport::create("in-process");
/// let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::default());
/// # drop((monitor, peer, events));
/// # });
/// ```
#[derive(Debug)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<OutboundEvent>,
    description: String,
}

/// The far end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    /// Push inbound notifications to the monitor.
    pub events: mpsc::Sender<ChannelEvent>,
    /// Everything the monitor emitted, in order.
    pub outbound: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl ChannelTransport {
    /// Wrap an existing outbound sender.
    pub fn new(sender: mpsc::UnboundedSender<OutboundEvent>, description: &str) -> Self {
        Self {
            sender,
            description: format!("channel: {}", description),
        }
    }

    /// Create a transport together with its peer and the inbound receiver
    /// to hand to [`LevelMonitor::run`](crate::LevelMonitor::run).
    pub fn create(description: &str) -> (Self, ChannelPeer, EventReceiver) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let transport = Self::new(out_tx, description);
        let peer = ChannelPeer {
            events: event_tx,
            outbound: out_rx,
        };
        (transport, peer, event_rx)
    }
}

impl Transport for ChannelTransport {
    fn emit(&self, event: OutboundEvent) -> Result<(), TransportError> {
        self.sender.send(event).map_err(|_| TransportError::Closed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::GradeUpdate;

    fn grade(value: f64) -> OutboundEvent {
        OutboundEvent::GradeUpdate(GradeUpdate {
            session_id: "s".to_string(),
            grade: value,
        })
    }

    #[test]
    fn test_channel_transport_emit() {
        let (transport, mut peer, _events) = ChannelTransport::create("test");

        transport.emit(grade(4.0)).unwrap();
        transport.emit(grade(3.5)).unwrap();

        assert_eq!(peer.outbound.try_recv().unwrap(), grade(4.0));
        assert_eq!(peer.outbound.try_recv().unwrap(), grade(3.5));
        assert!(peer.outbound.try_recv().is_err());
    }

    #[test]
    fn test_channel_transport_closed() {
        let (transport, peer, _events) = ChannelTransport::create("test");
        drop(peer);

        let err = transport.emit(grade(4.0)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_channel_transport_inbound() {
        let (_transport, peer, mut events) = ChannelTransport::create("test");

        peer.events.send(ChannelEvent::Connected).await.unwrap();
        peer.events.send(ChannelEvent::NoiseLevel(12.0)).await.unwrap();

        assert_eq!(events.recv().await, Some(ChannelEvent::Connected));
        assert_eq!(events.recv().await, Some(ChannelEvent::NoiseLevel(12.0)));
    }

    #[test]
    fn test_channel_transport_description() {
        let (transport, _peer, _events) = ChannelTransport::create("in-process");
        assert_eq!(transport.description(), "channel: in-process");
    }
}
