//! Error handling for the freenect2 boundary layer

use thiserror::Error;

/// Result type for freenect2 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving a device through the boundary layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No device matched the index, serial number, or default selector
    #[error("no device found for {0}")]
    DeviceNotFound(String),

    /// Streams are already running; they cannot be started again
    #[error("streams are already running")]
    StreamsRunning,

    /// The driver refused the operation. libfreenect2 gives no detail beyond its log output.
    #[error("driver refused to {0}")]
    DriverRefused(&'static str),

    /// The session was closed; only dropping it is valid
    #[error("device session is closed")]
    SessionClosed,

    /// The driver delivered a frame format this layer does not know
    #[error("unknown frame format {0}")]
    UnknownFormat(u32),

    /// The driver delivered a stream type this layer does not know
    #[error("unknown frame type {0}")]
    UnknownFrameType(u32),

    /// A log level value outside none/error/warning/info/debug
    #[error("unknown log level {0}")]
    UnknownLogLevel(u32),

    /// Frame metadata does not match the supplied buffer
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid configuration error
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfiguration(err.to_string())
    }
}
