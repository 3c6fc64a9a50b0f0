//! Error types for the realtime module.

use thiserror::Error;

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur during realtime operations.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket connection error.
    #[error("WebSocket connection error: {0}")]
    ConnectionError(String),

    /// The server refused the stored resumption handle.
    ///
    /// Callers should drop the handle and start a fresh session.
    #[error("Session resumption rejected: {0}")]
    ResumptionRejected(String),

    /// Malformed or unexpected wire message.
    #[error("WebSocket message error: {0}")]
    MessageError(String),

    /// Session not connected.
    #[error("Session not connected")]
    NotConnected,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Audio format error.
    #[error("Audio format error: {0}")]
    AudioFormatError(String),

    /// Microphone or speaker unavailable.
    #[error("Audio device error: {0}")]
    DeviceError(String),

    /// Tool execution error.
    #[error("Tool execution error: {0}")]
    ToolError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new resumption rejection.
    pub fn resumption_rejected<S: Into<String>>(msg: S) -> Self {
        Self::ResumptionRejected(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::MessageError(msg.into())
    }

    /// Create a new audio format error.
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::AudioFormatError(msg.into())
    }

    /// Create a new audio device error.
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::DeviceError(msg.into())
    }

    /// Create a new tool error.
    pub fn tool<S: Into<String>>(msg: S) -> Self {
        Self::ToolError(msg.into())
    }

    /// Whether the session must be restarted without a resumption handle.
    pub fn is_resumption_rejected(&self) -> bool {
        matches!(self, Self::ResumptionRejected(_))
    }

    /// Whether this error came from the microphone or speaker.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::DeviceError(_))
    }
}
