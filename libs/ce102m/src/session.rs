//! Session state machine for one connect/negotiate/transfer/disconnect
//! cycle.
//!
//! One [`MeterSession`] drives exactly one polling cycle:
//!
//! ```text
//! Disconnected -> Identifying -> Negotiating -> (AwaitingPassword)
//!              -> Transferring -> (CommandLoop) -> Disconnected
//! ```
//!
//! NAK and silence both restart the whole handshake (the meter stops
//! answering after a NAK instead of waiting for a repeat); the restart
//! count is bounded by [`SessionConfig::max_restarts`]. The session
//! borrows the transport for its lifetime and never outlives one cycle;
//! the parameter registry is lent in by the scheduler.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{MeterError, Result};
use crate::frame::{self, Frame, ACK, NAK};
use crate::registry::ParameterRegistry;
use crate::traits::{OperatorInput, Sink, Transport};

/// Identification request sent to the meter ("general request").
pub const IDENT_REQUEST: &[u8] = b"/?!\r\n";

/// Every N-th daemon cycle reads the full parameter set.
pub const FULL_SET_PERIOD: u64 = 5;

/// Daemon cadence: whether cycle `counter` requests the full set.
///
/// Cycles 0, 5, 10, ... read everything and declare schema metadata;
/// the cycles in between run a short session for the limited set.
pub fn is_full_cycle(counter: u64) -> bool {
    counter % FULL_SET_PERIOD == 0
}

/// Negotiated session mode, mapped to the protocol mode digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Full parameter set (digit '0', the default).
    Full,
    /// Limited parameter set (digit '6').
    Limited,
    /// Programming mode with password exchange (digit '1').
    Program,
}

impl ReadMode {
    /// Mode digit sent in the acknowledgment/mode-select message.
    pub fn digit(self) -> u8 {
        match self {
            ReadMode::Full => b'0',
            ReadMode::Limited => b'6',
            ReadMode::Program => b'1',
        }
    }
}

/// Per-cycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Negotiated mode for this cycle.
    pub mode: ReadMode,
    /// Request only the limited set (daemon off-cycles). Short cycles
    /// also skip the schema metadata declaration.
    pub short_cycle: bool,
    /// Suppress operator prompts (silent programming mode).
    pub silent: bool,
    /// How many handshake restarts to allow before abandoning the cycle.
    /// The original daemon retried forever; this bound keeps a dead
    /// device from pinning the cycle.
    pub max_restarts: u32,
}

impl SessionConfig {
    /// Configuration with the default restart bound.
    pub fn new(mode: ReadMode) -> Self {
        Self {
            mode,
            short_cycle: false,
            silent: false,
            max_restarts: 3,
        }
    }

    /// Mark this cycle as a short (limited-set) daemon cycle.
    pub fn short(mut self, short: bool) -> Self {
        self.short_cycle = short;
        self
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// At least one data frame was decoded and published.
    Published,
    /// The session completed without a data transfer (ACK-only command
    /// exchange, or the operator exited before reading).
    NoData,
    /// The operator closed input at a prompt; the session disconnected
    /// cleanly without finishing.
    Cancelled,
}

/// State machine for one polling cycle.
///
/// Owns borrows of the transport, sink and operator input for the cycle
/// and caches the programming password for the session lifetime only.
pub struct MeterSession<'a, T, S, I>
where
    T: Transport,
    S: Sink,
    I: OperatorInput,
{
    config: SessionConfig,
    transport: &'a mut T,
    sink: &'a mut S,
    input: &'a mut I,
    password: Option<String>,
    schema_declared: bool,
    line_re: Regex,
}

impl<'a, T, S, I> MeterSession<'a, T, S, I>
where
    T: Transport,
    S: Sink,
    I: OperatorInput,
{
    /// Create a session for one cycle.
    pub fn new(
        config: SessionConfig,
        transport: &'a mut T,
        sink: &'a mut S,
        input: &'a mut I,
    ) -> Result<Self> {
        // KEY(value) data lines; value may be empty.
        let line_re = Regex::new(r"(.+)\((.*)\)")
            .map_err(|e| MeterError::Protocol(format!("line pattern: {e}")))?;
        Ok(Self {
            config,
            transport,
            sink,
            input,
            password: None,
            schema_declared: false,
            line_re,
        })
    }

    /// Run the full cycle to completion.
    pub async fn run(&mut self, registry: &mut ParameterRegistry) -> Result<SessionOutcome> {
        // Clear any stale device session before identifying.
        self.send_disconnect().await?;

        let ident = self.identify().await?;
        let first_digit = if self.config.short_cycle {
            ReadMode::Limited.digit()
        } else {
            self.config.mode.digit()
        };
        let mut reply = self.negotiate(&ident, first_digit).await?;

        let mut restarts = 0u32;
        let mut published = false;

        // Keep handling responses until the meter closes the session.
        while reply.head != "B0" {
            if reply.head == "P0" {
                reply = match self.answer_password_challenge(&reply).await? {
                    Some(reply) => reply,
                    None => return Ok(SessionOutcome::Cancelled),
                };
                continue;
            }

            if reply.is_nak() || reply.is_silence() {
                restarts += 1;
                if restarts > self.config.max_restarts {
                    let message = format!(
                        "meter unresponsive after {} handshake restarts",
                        self.config.max_restarts
                    );
                    self.sink.report_error(&message).await?;
                    return Err(MeterError::RetriesExhausted(self.config.max_restarts));
                }
                if reply.is_nak() {
                    warn!(restarts, "(NAK) received, restarting handshake");
                } else {
                    warn!(restarts, "timeout, restarting handshake");
                }
                // Restart always renegotiates with the configured mode
                // digit, never the short-cycle one.
                self.send_disconnect().await?;
                let ident = self.identify().await?;
                reply = self.negotiate(&ident, self.config.mode.digit()).await?;
                continue;
            }

            if reply.is_ack() {
                debug!("(ACK)");
            } else if reply.head.is_empty() {
                if !reply.checksum_valid {
                    self.sink.report_error("Data is corrupt!").await?;
                    return Err(MeterError::ChecksumMismatch);
                }
                self.transfer(&reply.body, registry).await?;
                published = true;
            } else {
                // Anything outside {B0, P0, data} is a protocol violation,
                // not data to be guessed at.
                let message = format!("unexpected response head '{}'", reply.head);
                self.sink.report_error(&message).await?;
                return Err(MeterError::UnexpectedHead(reply.head));
            }

            if self.config.mode != ReadMode::Program {
                break;
            }

            reply = match self.command_prompt().await? {
                CommandStep::Reply(reply) => reply,
                CommandStep::Exit => break,
                CommandStep::Cancelled => return Ok(SessionOutcome::Cancelled),
            };
        }

        info!("disconnect");
        Ok(if published {
            SessionOutcome::Published
        } else {
            SessionOutcome::NoData
        })
    }

    /// Send a frame and read the raw response.
    async fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.transport.send(data).await?;
        self.transport.recv().await
    }

    /// Send the end-of-session frame (head "B0") and drain the reply.
    async fn send_disconnect(&mut self) -> Result<()> {
        self.exchange(&frame::encode("B0", "")).await?;
        Ok(())
    }

    /// Write the identification request and read the reply.
    async fn identify(&mut self) -> Result<Vec<u8>> {
        let ident = self.exchange(IDENT_REQUEST).await?;
        info!(
            ident = %String::from_utf8_lossy(&ident).trim_end(),
            "connect"
        );
        Ok(ident)
    }

    /// Send the acknowledgment/mode-select message and decode the reply.
    ///
    /// The message echoes the 5th character of the identification reply
    /// (the baud rate character) followed by the mode digit. A short or
    /// garbled identification is handled like silence so it flows into
    /// the bounded restart path.
    async fn negotiate(&mut self, ident: &[u8], digit: u8) -> Result<Frame> {
        let Some(&baud) = ident.get(4) else {
            debug!(len = ident.len(), "identification reply too short");
            return Ok(frame::decode(&[]));
        };
        let message = [ACK, b'0', baud, digit, b'\r', b'\n'];
        let raw = self.exchange(&message).await?;
        Ok(frame::decode(&raw))
    }

    /// Answer a "P0" password challenge.
    ///
    /// The password entered for this session is cached and reused for
    /// repeated challenges; `None` means the operator closed input and
    /// the session was disconnected cleanly.
    async fn answer_password_challenge(&mut self, challenge: &Frame) -> Result<Option<Frame>> {
        if self.password.is_none() {
            let text = if self.config.silent {
                String::new()
            } else {
                format!("Enter password {}: ", challenge.body)
            };
            match self.input.prompt(&text).await {
                Some(password) => self.password = Some(password),
                None => {
                    self.send_disconnect().await?;
                    return Ok(None);
                }
            }
        }
        // Cached above, never absent here.
        let body = format!("({})", self.password.as_deref().unwrap_or_default());
        let raw = self.exchange(&frame::encode("P1", &body)).await?;
        Ok(Some(frame::decode(&raw)))
    }

    /// Parse a data frame body, update the registry and publish.
    async fn transfer(&mut self, body: &str, registry: &mut ParameterRegistry) -> Result<()> {
        if !self.config.short_cycle && !self.schema_declared {
            debug!("declaring parameter schema");
            self.sink.declare_schema(&registry.schema()).await?;
            self.schema_declared = true;
        }

        for line in body.split('\n') {
            let Some(caps) = self.line_re.captures(line) else {
                continue;
            };
            let (key, value) = (&caps[1], &caps[2]);
            registry.update(key, value);

            if key == "STAT_" {
                match u32::from_str_radix(value, 16) {
                    Ok(word) => {
                        for (field, bit) in crate::status::decode(word) {
                            registry.update(field, &bit.to_string());
                        }
                    }
                    Err(_) => warn!(value, "unparseable STAT_ word"),
                }
            }
        }

        info!(
            short = self.config.short_cycle,
            "transferring data to sink"
        );
        for param in registry.snapshot() {
            self.sink.publish(param.key, &param.value).await?;
        }
        Ok(())
    }

    /// Run one round of the programming command prompt.
    async fn command_prompt(&mut self) -> Result<CommandStep> {
        let text = if self.config.silent {
            ""
        } else {
            "(R)ead, (W)rite or e(X)it (default)? "
        };
        let Some(choice) = self.input.prompt(text).await else {
            self.send_disconnect().await?;
            return Ok(CommandStep::Cancelled);
        };

        let head = match choice.trim().to_ascii_uppercase().as_str() {
            "R" => "R1",
            "W" => "W1",
            _ => {
                self.send_disconnect().await?;
                return Ok(CommandStep::Exit);
            }
        };

        let text = if self.config.silent {
            ""
        } else {
            "Enter command: "
        };
        let Some(body) = self.input.prompt(text).await else {
            self.send_disconnect().await?;
            return Ok(CommandStep::Cancelled);
        };

        let raw = self.exchange(&frame::encode(head, &body)).await?;
        Ok(CommandStep::Reply(frame::decode(&raw)))
    }
}

/// Outcome of one command-prompt round.
enum CommandStep {
    /// A command was sent; its decoded reply re-enters the response loop.
    Reply(Frame),
    /// The operator chose to exit; the session was disconnected.
    Exit,
    /// Input closed mid-prompt; the session was disconnected.
    Cancelled,
}
