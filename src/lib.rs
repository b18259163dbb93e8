//! # level-monitor
//!
//! A client-side view-model for a live classroom noise level feed.
//!
//! The crate tracks the connection to a push server, classifies each
//! incoming noise reading into a display color and an alert tier, and keeps
//! a session grade that is forwarded to the server whenever it changes.
//! Rendering is left to the consumer: it observes [`MonitorState`]
//! snapshots or field-level [`StateChange`]s and calls
//! [`LevelMonitor::set_grade`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ┌───────────┐  ChannelEvent   ┌──────────────┐   watch /    │
//! │  │ transport │────────────────▶│   monitor    │──broadcast──▶ UI
//! │  │           │◀────────────────│ (state bag)  │◀─set_grade── │
//! │  └───────────┘  OutboundEvent  └──────────────┘              │
//! │        ▲                                                     │
//! │  SocketIoTransport | StreamTransport | ChannelTransport      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`monitor`]**: [`LevelMonitor`], the state bag, classification and
//!   derived display values
//! - **[`transport`]**: the [`Transport`] trait with Socket.IO, line-delimited
//!   JSON stream and in-memory implementations
//! - **[`config`]**: layered [`Settings`] (defaults, file, environment)
//! - **[`command`]**: text commands used by the CLI to drive a monitor
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Connect to a Socket.IO server
//! level-monitor --url http://localhost:3000 --session abc123
//!
//! # Connect to a line-delimited JSON feed over TCP
//! level-monitor --connect localhost:9090
//! ```
//!
//! ### As a library with an in-memory channel
//!
//! ```
//! use std::sync::Arc;
//! use level_monitor::{ChannelEvent, ChannelTransport, LevelMonitor, Session, Thresholds};
//!
//! # tokio_test::block_on(async {
//! let (transport, mut peer, events) = ChannelTransport::create("in-process");
//! let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::default());
//!
//! monitor.handle_event(ChannelEvent::Connected);
//! monitor.set_session(Session::new("abc123", "Ana", "5B"));
//! monitor.set_grade(4.2);
//!
//! let state = monitor.state();
//! assert_eq!(state.status_message(), "Server connected");
//! assert_eq!(state.grade_color_class(), "grade-yellow");
//! assert!(peer.outbound.try_recv().is_ok());
//! # drop(events);
//! # });
//! ```
//!
//! ### As a library with a Socket.IO server
//!
//! ```no_run
//! use std::sync::Arc;
//! use level_monitor::{LevelMonitor, Settings, SocketIoOptions, SocketIoTransport};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None).unwrap();
//! let (transport, events, _handle) =
//!     SocketIoTransport::connect(&settings.api_url, SocketIoOptions::default()).unwrap();
//! let monitor = LevelMonitor::new(Arc::new(transport), settings.thresholds());
//! monitor.run(events).await;
//! # });
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod monitor;
pub mod transport;

// Re-export main types for convenience
pub use config::Settings;
pub use error::{SettingsError, TransportError};
pub use monitor::{
    classify_color, AlertState, DisplayColor, LevelMonitor, MonitorState, Session, StateChange,
    Thresholds,
};
pub use transport::{
    ChannelEvent, ChannelPeer, ChannelTransport, OutboundEvent, SocketIoOptions,
    SocketIoTransport, StreamTransport, Transport,
};
