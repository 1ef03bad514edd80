//! Bitfield decoder for the CE102M status word (`STAT_`).
//!
//! The meter reports its state as a 32-bit word rendered in hex. Every
//! sub-field is a pure function of that word; the decoder emits them in
//! the same order they appear in the parameter schema so they can be fed
//! straight into the registry.

/// Number of derived status fields.
pub const FIELD_COUNT: usize = 22;

/// Value of the bit at `position`, optionally inverted.
fn bit_at(value: u32, position: u32, invert: bool) -> u32 {
    ((value >> position) & 1) ^ u32::from(invert)
}

/// Decode the status word into its named sub-fields.
///
/// Bits 7 and 8 each feed an opposite-polarity pair (forward/backward
/// direction, capacitive/inductive load). "Voltage is normal" is derived:
/// set exactly when neither the upper (bit 10) nor lower (bit 11) voltage
/// alarm is raised.
pub fn decode(value: u32) -> [(&'static str, u32); FIELD_COUNT] {
    [
        ("Tariff", value & 0x7),
        ("Battery discharged", bit_at(value, 3, false)),
        ("Forward direction", bit_at(value, 7, true)),
        ("Backward direction", bit_at(value, 7, false)),
        ("Capacitive load", bit_at(value, 8, true)),
        ("Inductive load", bit_at(value, 8, false)),
        ("Time correction exhausted", bit_at(value, 9, false)),
        ("Voltage is normal", u32::from(value & 0x0C00 == 0)),
        ("Voltage is upper", bit_at(value, 10, false)),
        ("Voltage is lower", bit_at(value, 11, false)),
        ("Clock error", bit_at(value, 12, false)),
        ("Summer time", bit_at(value, 14, false)),
        ("CRC error", bit_at(value, 16, false)),
        ("Cover was opened", bit_at(value, 17, false)),
        ("Battery expired", bit_at(value, 19, false)),
        ("CRC memory error", bit_at(value, 20, false)),
        ("CRC metrological error", bit_at(value, 21, false)),
        ("Scheduled tariff 1", bit_at(value, 24, false)),
        ("Scheduled tariff 2", bit_at(value, 25, false)),
        ("Scheduled tariff 3", bit_at(value, 26, false)),
        ("Scheduled tariff 4", bit_at(value, 27, false)),
        ("Scheduler error", bit_at(value, 28, false)),
    ]
}
