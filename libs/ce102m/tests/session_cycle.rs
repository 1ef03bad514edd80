//! Full-handshake tests driven through scripted collaborators.
//!
//! Every test wires a [`MeterSession`] to a transport that replays a
//! fixed reply script, a sink that records everything it is given and an
//! operator input fed from a queue. No hardware, no terminal.

use std::collections::VecDeque;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use ce102m::session::IDENT_REQUEST;
use ce102m::{
    frame, MeterError, MeterSession, OperatorInput, ParamKind, ParameterRegistry, ReadMode, Result,
    SessionConfig, SessionOutcome, Sink, Transport, ACK, NAK,
};

/// Identification reply; byte 4 ('5') is echoed as the baud character.
const IDENT_REPLY: &[u8] = b"/ENG5CE102Mv01\r\n";

struct ScriptTransport {
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl ScriptTransport {
    fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            replies: replies.into(),
            sent: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for ScriptTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        Ok(self.replies.pop_front().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingSink {
    schemas: Vec<Vec<(&'static str, ParamKind)>>,
    published: Vec<(String, String)>,
    errors: Vec<String>,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn declare_schema(&mut self, schema: &[(&'static str, ParamKind)]) -> Result<()> {
        self.schemas.push(schema.to_vec());
        Ok(())
    }

    async fn publish(&mut self, key: &str, value: &str) -> Result<()> {
        self.published.push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn report_error(&mut self, message: &str) -> Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }
}

impl RecordingSink {
    fn value_of(&self, key: &str) -> Option<&str> {
        self.published
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

struct ScriptInput {
    lines: VecDeque<String>,
}

impl ScriptInput {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn closed() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }
}

#[async_trait]
impl OperatorInput for ScriptInput {
    async fn prompt(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

fn data_frame() -> Vec<u8> {
    frame::encode(
        "",
        "STAT_(03000002)\nDATE_(02.01.09.20)\nVOLTA(209.52)\nGRF17(07:00:01)\n",
    )
}

fn mode_select(digit: u8) -> Vec<u8> {
    vec![ACK, b'0', b'5', digit, b'\r', b'\n']
}

async fn run_session(
    config: SessionConfig,
    replies: Vec<Vec<u8>>,
    input_lines: &[&str],
) -> (
    std::result::Result<SessionOutcome, MeterError>,
    ScriptTransport,
    RecordingSink,
    ParameterRegistry,
) {
    let mut transport = ScriptTransport::new(replies);
    let mut sink = RecordingSink::default();
    let mut input = ScriptInput::new(input_lines);
    let mut registry = ParameterRegistry::ce102m();
    let outcome = {
        let mut session =
            MeterSession::new(config, &mut transport, &mut sink, &mut input).unwrap();
        session.run(&mut registry).await
    };
    (outcome, transport, sink, registry)
}

#[tokio::test]
async fn full_cycle_publishes_snapshot() {
    let replies = vec![Vec::new(), IDENT_REPLY.to_vec(), data_frame()];
    let (outcome, transport, sink, registry) =
        run_session(SessionConfig::new(ReadMode::Full), replies, &[]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);

    // Disconnect, identification request, mode select with digit '0'.
    assert_eq!(transport.sent[0], frame::encode("B0", ""));
    assert_eq!(transport.sent[1], IDENT_REQUEST.to_vec());
    assert_eq!(transport.sent[2], mode_select(b'0'));
    assert_eq!(transport.sent.len(), 3);

    // Schema declared once, full snapshot published in schema order.
    assert_eq!(sink.schemas.len(), 1);
    assert_eq!(sink.published.len(), registry.len());
    assert_eq!(sink.published[0].0, "STAT_");
    assert_eq!(sink.value_of("VOLTA"), Some("209.52"));
    assert_eq!(sink.value_of("DATE_"), Some("02.01.09.20"));

    // Status word decoded into derived fields.
    assert_eq!(sink.value_of("Tariff"), Some("2"));
    assert_eq!(sink.value_of("Forward direction"), Some("1"));
    assert_eq!(sink.value_of("Backward direction"), Some("0"));
    assert_eq!(sink.value_of("Scheduled tariff 1"), Some("1"));

    // Undocumented graph-schedule line ignored without error.
    assert_eq!(registry.get("GRF17"), None);
    assert!(sink.errors.is_empty());
}

#[tokio::test]
async fn short_cycle_uses_limited_digit_and_skips_schema() {
    let replies = vec![Vec::new(), IDENT_REPLY.to_vec(), data_frame()];
    let (outcome, transport, sink, _) =
        run_session(SessionConfig::new(ReadMode::Full).short(true), replies, &[]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);
    assert_eq!(transport.sent[2], mode_select(b'6'));
    assert!(sink.schemas.is_empty());
    assert_eq!(sink.value_of("VOLTA"), Some("209.52"));
}

#[tokio::test]
async fn nak_restarts_from_identification() {
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
        Vec::new(),
        IDENT_REPLY.to_vec(),
        data_frame(),
    ];
    let (outcome, transport, _, _) =
        run_session(SessionConfig::new(ReadMode::Full), replies, &[]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);
    // Restart repeats the whole handshake: B0, "/?!", mode select.
    assert_eq!(transport.sent[3], frame::encode("B0", ""));
    assert_eq!(transport.sent[4], IDENT_REQUEST.to_vec());
    assert_eq!(transport.sent[5], mode_select(b'0'));
    assert_eq!(transport.sent.len(), 6);
}

#[tokio::test]
async fn timeout_and_nak_recover_identically() {
    let nak_replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
        Vec::new(),
        IDENT_REPLY.to_vec(),
        data_frame(),
    ];
    let timeout_replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        Vec::new(), // silence instead of NAK
        Vec::new(),
        IDENT_REPLY.to_vec(),
        data_frame(),
    ];

    let (nak_outcome, nak_transport, _, _) =
        run_session(SessionConfig::new(ReadMode::Full), nak_replies, &[]).await;
    let (timeout_outcome, timeout_transport, _, _) =
        run_session(SessionConfig::new(ReadMode::Full), timeout_replies, &[]).await;

    assert_eq!(nak_outcome.unwrap(), timeout_outcome.unwrap());
    assert_eq!(nak_transport.sent, timeout_transport.sent);
}

#[tokio::test]
async fn restart_uses_configured_digit_after_short_negotiation() {
    // Short cycle negotiates with '6', but a restart falls back to the
    // configured (non-short) digit.
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
        Vec::new(),
        IDENT_REPLY.to_vec(),
        data_frame(),
    ];
    let (outcome, transport, _, _) =
        run_session(SessionConfig::new(ReadMode::Full).short(true), replies, &[]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);
    assert_eq!(transport.sent[2], mode_select(b'6'));
    assert_eq!(transport.sent[5], mode_select(b'0'));
}

#[tokio::test]
async fn retry_bound_abandons_cycle() {
    let mut config = SessionConfig::new(ReadMode::Full);
    config.max_restarts = 2;

    // Every negotiation answered with NAK.
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![NAK],
    ];
    let (outcome, transport, sink, _) = run_session(config, replies, &[]).await;

    assert!(matches!(outcome, Err(MeterError::RetriesExhausted(2))));
    // Initial handshake plus two bounded restarts.
    let idents = transport
        .sent
        .iter()
        .filter(|s| s.as_slice() == IDENT_REQUEST)
        .count();
    assert_eq!(idents, 3);
    assert_eq!(sink.errors.len(), 1);
}

#[tokio::test]
async fn corrupt_frame_is_reported_and_nothing_published() {
    let mut corrupted = data_frame();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x7F;

    let replies = vec![Vec::new(), IDENT_REPLY.to_vec(), corrupted];
    let (outcome, _, sink, registry) =
        run_session(SessionConfig::new(ReadMode::Full), replies, &[]).await;

    assert!(matches!(outcome, Err(MeterError::ChecksumMismatch)));
    assert_eq!(sink.errors, vec!["Data is corrupt!".to_string()]);
    assert!(sink.published.is_empty());
    // Registry untouched by the corrupt frame.
    assert_eq!(registry.get("STAT_"), Some(""));
    assert_eq!(registry.get("VOLTA"), Some(""));
}

#[tokio::test]
async fn unexpected_head_is_reported_and_aborts() {
    let replies = vec![Vec::new(), IDENT_REPLY.to_vec(), frame::encode("Z9", "?")];
    let (outcome, _, sink, _) =
        run_session(SessionConfig::new(ReadMode::Full), replies, &[]).await;

    match outcome {
        Err(MeterError::UnexpectedHead(head)) => assert_eq!(head, "Z9"),
        other => panic!("expected UnexpectedHead, got {other:?}"),
    }
    assert_eq!(sink.errors.len(), 1);
    assert!(sink.published.is_empty());
}

#[tokio::test]
async fn password_challenge_uses_operator_input() {
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        frame::encode("P0", "140616670"),
        data_frame(),
        Vec::new(), // reply to the final disconnect
    ];
    let (outcome, transport, sink, _) = run_session(
        SessionConfig::new(ReadMode::Program),
        replies,
        &["777777", "x"],
    )
    .await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);
    assert_eq!(transport.sent[3], frame::encode("P1", "(777777)"));
    // Operator exited: explicit disconnect closes the session.
    assert_eq!(transport.sent.last().unwrap(), &frame::encode("B0", ""));
    assert_eq!(sink.value_of("VOLTA"), Some("209.52"));
}

#[tokio::test]
async fn password_eof_disconnects_cleanly() {
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        frame::encode("P0", "140616670"),
        Vec::new(), // reply to the disconnect
    ];
    let mut transport = ScriptTransport::new(replies);
    let mut sink = RecordingSink::default();
    let mut input = ScriptInput::closed();
    let mut registry = ParameterRegistry::ce102m();

    let outcome = {
        let mut session = MeterSession::new(
            SessionConfig::new(ReadMode::Program),
            &mut transport,
            &mut sink,
            &mut input,
        )
        .unwrap();
        session.run(&mut registry).await
    };

    assert_eq!(outcome.unwrap(), SessionOutcome::Cancelled);
    assert_eq!(transport.sent.last().unwrap(), &frame::encode("B0", ""));
    assert!(sink.published.is_empty());
}

#[tokio::test]
async fn command_loop_sends_read_command() {
    let second_data = frame::encode("", "ET0PE(0.93)\n");
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        data_frame(),
        second_data,
        Vec::new(), // reply to the final disconnect
    ];
    let (outcome, transport, sink, registry) = run_session(
        SessionConfig::new(ReadMode::Program),
        replies,
        &["r", "ET0PE()", "x"],
    )
    .await;

    assert_eq!(outcome.unwrap(), SessionOutcome::Published);
    assert!(transport
        .sent
        .iter()
        .any(|s| s == &frame::encode("R1", "ET0PE()")));
    assert_eq!(registry.get("ET0PE"), Some("0.93"));
    // Snapshot published once per data frame.
    assert_eq!(sink.published.len(), 2 * registry.len());
}

#[tokio::test]
async fn ack_only_command_session_ends_without_data() {
    let replies = vec![
        Vec::new(),
        IDENT_REPLY.to_vec(),
        vec![ACK],
        Vec::new(), // reply to the disconnect
    ];
    let (outcome, transport, sink, _) =
        run_session(SessionConfig::new(ReadMode::Program), replies, &["x"]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::NoData);
    assert!(sink.published.is_empty());
    assert_eq!(transport.sent.last().unwrap(), &frame::encode("B0", ""));
}

#[tokio::test]
async fn meter_closing_with_b0_ends_session() {
    let replies = vec![Vec::new(), IDENT_REPLY.to_vec(), frame::encode("B0", "")];
    let (outcome, _, sink, _) =
        run_session(SessionConfig::new(ReadMode::Full), replies, &[]).await;

    assert_eq!(outcome.unwrap(), SessionOutcome::NoData);
    assert!(sink.published.is_empty());
    assert!(sink.errors.is_empty());
}
