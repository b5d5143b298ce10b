//! # Error Types
//!
//! Custom error types for the rover base station using `thiserror`.

use thiserror::Error;

/// Main error type for the base station
#[derive(Debug, Error)]
pub enum BaseStationError {
    /// Legacy packed-frame protocol errors
    #[error("Legacy protocol error: {0}")]
    Protocol(String),

    /// Extensible message framing errors
    #[error("Message error: {0}")]
    Message(String),

    /// Extensible message with a type tag nobody registered
    #[error("Unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// JSON payload errors
    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial ports could be opened
    #[error("No XBee device found (tried: {0})")]
    SerialPortNotFound(String),

    /// XBee API frame errors
    #[error("XBee API frame error: {0}")]
    Xbee(String),

    /// Controller input errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No supported controller connected
    #[error("No supported controller found")]
    ControllerNotFound,

    /// Link was never opened or failed to open
    #[error("Link is not open")]
    LinkDisabled,

    /// Remote end closed the link
    #[error("Link closed")]
    LinkClosed,
}

/// Result type alias for the base station
pub type Result<T> = std::result::Result<T, BaseStationError>;
