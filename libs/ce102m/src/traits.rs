//! Trait seams between the protocol engine and its collaborators.
//!
//! The session state machine only ever talks to these three traits. The
//! service crate binds them to a serial port, an MQTT broker and stdin;
//! tests bind them to scripted mocks and drive whole handshakes without
//! hardware or an operator.

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::ParamKind;

/// Duplex byte stream with bounded-timeout reads.
///
/// `recv` must return an empty buffer when the device stays silent for
/// the timeout window. Silence is a protocol condition the session
/// recovers from, not an error.
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the device.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever the device answers within the timeout window.
    async fn recv(&mut self) -> Result<Vec<u8>>;
}

/// Receiver of parameter updates and error events.
#[async_trait]
pub trait Sink: Send {
    /// Declare the parameter schema. Idempotent; called once per
    /// non-short cycle.
    async fn declare_schema(&mut self, schema: &[(&'static str, ParamKind)]) -> Result<()>;

    /// Publish one parameter value.
    async fn publish(&mut self, key: &str, value: &str) -> Result<()>;

    /// Report a cycle-level error (corrupt data, protocol violation).
    async fn report_error(&mut self, message: &str) -> Result<()>;
}

/// Operator text input for password entry and the command loop.
///
/// This is the session's only other suspend point besides the transport
/// read. `None` signals end-of-input and triggers a clean disconnect.
#[async_trait]
pub trait OperatorInput: Send {
    /// Show `prompt` (may be empty in silent mode) and wait for a line.
    async fn prompt(&mut self, prompt: &str) -> Option<String>;
}
