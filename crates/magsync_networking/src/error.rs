//! # Networking Error Types
//!
//! All errors that can occur in the sync layer.

use thiserror::Error;

use magsync_shared::ConfigError;

/// A datagram did not match any fixed wire layout.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// Buffer length differs from the layout being decoded.
    #[error("wrong packet length: expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Exact size of the layout.
        expected: usize,
        /// Size of the buffer handed in.
        actual: usize,
    },

    /// Buffer length matches no known packet variant.
    #[error("no packet variant is {0} bytes long")]
    UnknownLength(usize),

    /// Padding bytes of the counter packet were not zero.
    #[error("non-zero padding in counter packet")]
    NonZeroPadding,
}

/// Errors raised by the transport endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The endpoint could not be created. Fatal: no session can run.
    #[error("endpoint init failed: {0}")]
    Init(String),

    /// The payload plus header exceeds the configured maximum.
    #[error("payload of {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Largest payload the endpoint accepts.
        max: usize,
    },
}

/// Top-level error for the networking crate.
#[derive(Error, Debug)]
pub enum NetError {
    /// Malformed packet.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Endpoint failure.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for networking operations.
pub type NetResult<T> = Result<T, NetError>;
