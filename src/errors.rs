// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera device
//!
//! Per-frame conditions ([`DecodeError`], write failures in [`RecordingError`])
//! are absorbed by the frame pipeline. Everything reaching [`AppError`] at the
//! top level terminates the process.

use crate::backends::camera::types::FrameGeometry;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or incomplete startup configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Shared memory regions could not be created
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),
    /// The camera stream failed or stalled
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// Recording file could not be opened or written
    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),
    /// Malformed recording data
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    /// Generic I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No camera URL given
    #[error("camera URL must not be empty")]
    EmptyUrl,
    /// Width or height is zero
    #[error("frame geometry {0} must be non-zero")]
    ZeroGeometry(FrameGeometry),
    /// I420 chroma planes need even dimensions
    #[error("frame geometry {0} must have even width and height")]
    OddGeometry(FrameGeometry),
    /// `--remote` was requested without a control session id
    #[error("--remote specified but no --cid provided")]
    MissingControlSession,
    /// Shared memory name is empty
    #[error("shared memory name for {0} must not be empty")]
    EmptyRegionName(&'static str),
    /// Both regions would map to the same name
    #[error("shared memory names must differ, both are '{0}'")]
    DuplicateRegionName(String),
}

/// Shared memory errors
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    /// Name cannot be passed to `shm_open`
    #[error("invalid shared memory name '{0}'")]
    InvalidName(String),
    /// Requested size does not fit the region header
    #[error("invalid shared memory size {size} for '{name}'")]
    InvalidSize { name: String, size: usize },
    /// A system call on the region failed
    #[error("{operation} failed for '{name}': {source}")]
    Os {
        name: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Camera transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP client error (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status
    #[error("camera returned HTTP status {0}")]
    Status(u16),
    /// Throughput dropped below the configured minimum
    #[error("stream stalled: {bytes} bytes in {seconds}s (minimum {limit} bytes/s)")]
    Stalled { bytes: u64, seconds: u64, limit: u64 },
}

/// Recording errors
#[derive(Debug, Error)]
pub enum RecordingError {
    /// Could not create the recording file
    #[error("failed to create '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Appending to the recording file failed
    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The frame could not be wrapped into an envelope
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Frame decoding rejections
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length frame buffer
    #[error("empty frame")]
    EmptyFrame,
    /// Probed geometry differs from the configured target
    #[error("expecting {expected}, found {found}")]
    GeometryMismatch {
        expected: FrameGeometry,
        found: FrameGeometry,
    },
    /// The JPEG decoder failed
    #[error("codec failure: {0}")]
    Codec(String),
}

/// Envelope framing and protobuf decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not enough bytes for the announced content
    #[error("truncated data")]
    Truncated,
    /// Frame header magic is missing
    #[error("invalid envelope header")]
    InvalidHeader,
    /// Payload does not fit the 24-bit length field
    #[error("payload of {0} bytes exceeds envelope limit")]
    PayloadTooLarge(usize),
    /// Protobuf content is not well formed
    #[error("malformed message: {0}")]
    Malformed(String),
}
