//! # ce102m
//!
//! Protocol engine for the Energomera CE102M power meter, speaking the
//! IEC 61107-family "mode-C" handshake over a serial line.
//!
//! The crate covers the correctness-critical core of the exchange:
//!
//! - SOH/STX/ETX frame encoding and decoding with the meter's LRC-style
//!   checksum ([`frame`])
//! - the 32-bit status word bitfield decoder ([`status`])
//! - the fixed, ordered parameter schema ([`registry`])
//! - the session state machine: identify, negotiate, optional password
//!   exchange, NAK/timeout recovery and the programming command loop
//!   ([`session`])
//!
//! Serial port handling, publishing and operator input are behind the
//! [`Transport`], [`Sink`] and [`OperatorInput`] traits so the whole
//! handshake can be driven headless in tests.
//!
//! ## Example
//!
//! ```ignore
//! use ce102m::{MeterSession, ParameterRegistry, ReadMode, SessionConfig};
//!
//! let mut registry = ParameterRegistry::ce102m();
//! let config = SessionConfig::new(ReadMode::Full);
//! let mut session = MeterSession::new(config, &mut transport, &mut sink, &mut input)?;
//! let outcome = session.run(&mut registry).await?;
//! ```

pub mod error;
pub mod frame;
pub mod registry;
pub mod session;
pub mod status;
pub mod traits;

pub use crate::error::{MeterError, Result};
pub use crate::frame::{Frame, ACK, ETX, NAK, SOH, STX};
pub use crate::registry::{ParamKind, Parameter, ParameterRegistry};
pub use crate::session::{
    is_full_cycle, MeterSession, ReadMode, SessionConfig, SessionOutcome, FULL_SET_PERIOD,
};
pub use crate::traits::{OperatorInput, Sink, Transport};
