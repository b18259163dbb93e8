//! Transport abstraction for the push-notification channel.
//!
//! A transport delivers [`ChannelEvent`]s to the monitor through an mpsc
//! receiver and accepts [`OutboundEvent`]s through the [`Transport`] trait.
//! Reconnection policy, if any, lives entirely inside the transport.

mod channel;
mod frame;
mod socketio;
mod stream;

pub use channel::{ChannelPeer, ChannelTransport};
pub use frame::{coerce_reading, Frame, EVENT_GRADE_UPDATE, EVENT_LEVEL_UPDATE};
pub use socketio::{SocketIoOptions, SocketIoTransport};
pub use stream::StreamTransport;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Receiving end handed to [`LevelMonitor::run`](crate::LevelMonitor::run).
pub type EventReceiver = mpsc::Receiver<ChannelEvent>;

/// Buffer size for inbound event channels.
pub(crate) const EVENT_BUFFER: usize = 64;

/// Inbound notification from the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    ConnectFailed,
    Disconnected,
    /// A new reading, already coerced to a finite number.
    NoiseLevel(f64),
}

/// Payload of the outbound grade notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeUpdate {
    #[serde(rename = "sesionId", alias = "sessionId")]
    pub session_id: String,
    #[serde(rename = "nota", alias = "grade")]
    pub grade: f64,
}

/// Outbound notification to the remote party.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    GradeUpdate(GradeUpdate),
}

/// Sending half of a channel connection.
///
/// `emit` must not block: implementations enqueue the event and return.
/// An `Err` means the event was not accepted at all.
pub trait Transport: Send + Sync + Debug {
    /// Hand an event to the transport for delivery.
    fn emit(&self, event: OutboundEvent) -> Result<(), TransportError>;

    /// Returns a human-readable description of the channel endpoint.
    fn description(&self) -> &str;
}
