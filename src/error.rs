//! Error types for pitwall

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pitwall error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Physical link to the diagnostic adapter was lost mid-session
    #[error("Diagnostic device disconnected")]
    DeviceDisconnected,

    /// Malformed or unrecognized inbound frame (logged, never propagated)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Message serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration file could not be written
    #[error("Config error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
