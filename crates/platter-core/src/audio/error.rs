//! Audio output error types

use thiserror::Error;

/// Errors that can occur while managing the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output device available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to query the device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build the output stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Failed to pause/stop the stream
    #[error("Failed to stop audio stream: {0}")]
    StreamStopError(String),

    /// Device produces a sample format the engine does not render
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
