//! Error types for transports and configuration.

use thiserror::Error;

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The background connection task is gone; nothing can be sent.
    #[error("Transport closed")]
    Closed,

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The endpoint address could not be turned into a channel URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failed to encode an outbound frame.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// Protocol violation on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
            WsError::Io(e) => TransportError::Connection(e.to_string()),
            WsError::Url(e) => TransportError::InvalidEndpoint(e.to_string()),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

/// Errors raised while loading [`Settings`](crate::config::Settings).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
