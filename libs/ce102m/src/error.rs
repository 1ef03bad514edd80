//! Error types for the CE102M protocol engine.

use thiserror::Error;

/// Errors that abort a polling cycle.
///
/// Timeouts and NAK responses are not listed here: the session recovers
/// from them by restarting the handshake, and only surfaces
/// [`MeterError::RetriesExhausted`] once the configured bound is hit.
#[derive(Error, Debug)]
pub enum MeterError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The meter kept answering with NAK or silence through every
    /// allowed handshake restart.
    #[error("no usable response from meter after {0} handshake restarts")]
    RetriesExhausted(u32),

    /// A data frame arrived with a checksum that does not match its
    /// contents. The cycle is abandoned without publishing.
    #[error("data is corrupt: frame checksum mismatch")]
    ChecksumMismatch,

    /// The meter answered the negotiation with a head outside the
    /// protocol vocabulary (not B0, P0 or a data frame).
    #[error("unexpected response head {0:?}")]
    UnexpectedHead(String),

    /// The publish sink rejected an update.
    #[error("sink error: {0}")]
    Sink(String),

    /// Internal protocol engine failure.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, MeterError>;
