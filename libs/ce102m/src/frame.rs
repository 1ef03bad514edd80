//! SOH/STX/ETX frame codec with the CE102M checksum.
//!
//! A frame on the wire is `[SOH head] [STX body] ETX checksum`. Head and
//! body sections are optional; the trailing checksum byte is the modulo
//! 0x80 sum described below. Bare control bytes (ACK, NAK) arrive as
//! single-byte messages outside the framing and are passed through as-is.

/// Start of header.
pub const SOH: u8 = 0x01;
/// Start of text.
pub const STX: u8 = 0x02;
/// End of text.
pub const ETX: u8 = 0x03;
/// Positive acknowledgement.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement (repeat request).
pub const NAK: u8 = 0x15;

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Head section (command tag such as "B0", "P0", "R1").
    pub head: String,
    /// Body section, or the raw input for ≤1-byte control messages.
    pub body: String,
    /// Whether the trailing checksum byte matched the computed sum.
    pub checksum_valid: bool,
}

impl Frame {
    /// True for a bare ACK control byte.
    pub fn is_ack(&self) -> bool {
        self.body.as_bytes() == [ACK]
    }

    /// True for a bare NAK control byte.
    pub fn is_nak(&self) -> bool {
        self.body.as_bytes() == [NAK]
    }

    /// True when nothing arrived within the transport timeout.
    pub fn is_silence(&self) -> bool {
        self.head.is_empty() && self.body.is_empty()
    }
}

/// Checksum over an assembled frame, per the meter's actual algorithm.
///
/// The sum runs modulo 0x80 and is gated by an accumulation flag: SOH
/// turns accumulation on without being summed; STX is summed only when
/// accumulation is already on, otherwise it turns it on; ETX is always
/// summed and turns accumulation off; every other byte is summed while
/// accumulation is on. The asymmetry (first marker skipped, later
/// markers counted) is what the hardware computes.
fn checksum(data: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    let mut accumulating = false;
    for &byte in data {
        match byte {
            SOH => accumulating = true,
            STX => {
                if accumulating {
                    sum = (sum.wrapping_add(STX)) & 0x7F;
                } else {
                    accumulating = true;
                }
            }
            ETX => {
                accumulating = false;
                sum = (sum.wrapping_add(ETX)) & 0x7F;
            }
            _ => {
                if accumulating {
                    sum = (sum.wrapping_add(byte)) & 0x7F;
                }
            }
        }
    }
    sum
}

/// Encode a frame: optional SOH+head, optional STX+body, ETX, checksum.
pub fn encode(head: &str, body: &str) -> Vec<u8> {
    let mut raw = Vec::with_capacity(head.len() + body.len() + 4);
    if !head.is_empty() {
        raw.push(SOH);
        raw.extend_from_slice(head.as_bytes());
    }
    if !body.is_empty() {
        raw.push(STX);
        raw.extend_from_slice(body.as_bytes());
    }
    raw.push(ETX);
    let sum = checksum(&raw);
    raw.push(sum);
    raw
}

/// Decode a raw message into a [`Frame`].
///
/// Inputs of one byte or less are control messages (ACK, NAK, silence):
/// they carry no checksum and come back verbatim in `body` with
/// `checksum_valid` set. Longer inputs are scanned for head/body
/// sections; the final byte is the claimed checksum.
pub fn decode(raw: &[u8]) -> Frame {
    if raw.len() <= 1 {
        return Frame {
            head: String::new(),
            body: String::from_utf8_lossy(raw).into_owned(),
            checksum_valid: true,
        };
    }

    let mut head = Vec::new();
    let mut body = Vec::new();
    let mut in_head = false;
    let mut in_body = false;

    let (payload, claimed) = raw.split_at(raw.len() - 1);
    for &byte in payload {
        match byte {
            SOH => {
                in_head = true;
                in_body = false;
            }
            STX => {
                in_head = false;
                in_body = true;
            }
            ETX => {
                in_head = false;
                in_body = false;
            }
            _ => {
                if in_head {
                    head.push(byte);
                } else if in_body {
                    body.push(byte);
                }
            }
        }
    }

    Frame {
        head: String::from_utf8_lossy(&head).into_owned(),
        body: String::from_utf8_lossy(&body).into_owned(),
        checksum_valid: checksum(payload) == claimed[0],
    }
}
