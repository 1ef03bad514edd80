//! Fixed-schema ordered store of meter parameters.
//!
//! The schema mirrors the CE102M data set: the device fields the meter
//! reports in its information message, followed by the sub-fields derived
//! from the `STAT_` status word. Insertion order is fixed here and
//! preserved by [`ParameterRegistry::snapshot`]; sinks rely on it for
//! stable metadata declaration and publishing.

/// Wirenboard-style control type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Value,
    Voltage,
    PowerConsumption,
    Alarm,
    Switch,
}

impl ParamKind {
    /// Meta-type string used when declaring schema at the sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Text => "text",
            ParamKind::Value => "value",
            ParamKind::Voltage => "voltage",
            ParamKind::PowerConsumption => "power_consumption",
            ParamKind::Alarm => "alarm",
            ParamKind::Switch => "switch",
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, typed parameter slot.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub key: &'static str,
    pub kind: ParamKind,
    pub value: String,
}

/// Ordered collection of all CE102M parameters.
///
/// Created once at startup and mutated in place on each successful data
/// frame; it lives for the whole process and is lent to each polling
/// cycle by the scheduler.
#[derive(Debug)]
pub struct ParameterRegistry {
    params: Vec<Parameter>,
}

impl ParameterRegistry {
    /// Build the full CE102M schema.
    ///
    /// Device fields first, in the order the meter lists them, then the
    /// status sub-fields in status-decoder order. The `GRF02`..`GRF36`
    /// graph-schedule fields are deliberately absent: lines for them are
    /// ignored by [`update`](Self::update).
    pub fn ce102m() -> Self {
        use ParamKind::*;

        let device_fields: &[(&'static str, ParamKind)] = &[
            ("STAT_", Text),             // 03000002
            ("RECPW", Text),             // 080BF3CA
            ("DATE_", Text),             // 02.01.09.20
            ("TIME_", Text),             // 01:38:52
            ("WATCH", Text),             // 01:38:52,02.01.09.20,0
            ("DELTA", Value),            // 1
            ("TTOFF", Value),            // 5
            ("TRANS", Value),            // 0
            ("HOURS", Value),            // 770
            ("VINFO", Text),             // v01.0401;Mar 21 2016
            ("SCSD_", Text),             // 1,2,1034,1,1,1
            ("ASMBL", Text),             // D2F8S3P0N0
            ("MODEL", Text),             // 0
            ("SNUMB", Text),             // 010748140616670
            ("VOLTA", Voltage),          // 209.52 V
            ("CURRE", Value),            // 0.108 A
            ("POWEP", PowerConsumption), // 0.020786 kWh
            ("COS_f", Value),            // 0.906
            ("FREQU", Value),            // 49.97 Hz
            ("HVOLT", Voltage),          // 253 V
            ("LVOLT", Voltage),          // 198 V
            ("V_RAT", Value),            // 16648
            ("I_RAT", Value),            // 19197
            ("GCOR1", Value),            // 16719
            ("POFF1", Value),            // 9200
            ("PCOR1", Value),            // 0
            ("MPCHS", Text),             // C2CB
            ("ET0PE", Value),            // 0.93 kW
            ("IDPAS", Text),             // 140616670
            ("GRF01", Text),             // 07:00:01
        ];

        let status_fields: &[(&'static str, ParamKind)] = &[
            ("Tariff", Value),
            ("Battery discharged", Alarm),
            ("Forward direction", Switch),
            ("Backward direction", Switch),
            ("Capacitive load", Switch),
            ("Inductive load", Switch),
            ("Time correction exhausted", Alarm),
            ("Voltage is normal", Switch),
            ("Voltage is upper", Alarm),
            ("Voltage is lower", Alarm),
            ("Clock error", Alarm),
            ("Summer time", Switch),
            ("CRC error", Alarm),
            ("Cover was opened", Alarm),
            ("Battery expired", Alarm),
            ("CRC memory error", Alarm),
            ("CRC metrological error", Alarm),
            ("Scheduled tariff 1", Switch),
            ("Scheduled tariff 2", Switch),
            ("Scheduled tariff 3", Switch),
            ("Scheduled tariff 4", Switch),
            ("Scheduler error", Alarm),
        ];

        let params = device_fields
            .iter()
            .chain(status_fields.iter())
            .map(|&(key, kind)| Parameter {
                key,
                kind,
                value: String::new(),
            })
            .collect();

        Self { params }
    }

    /// Replace the value of `key` in place.
    ///
    /// Unknown keys are silently ignored (the meter emits undocumented
    /// graph-schedule lines); returns whether a slot was updated.
    pub fn update(&mut self, key: &str, value: &str) -> bool {
        match self.params.iter_mut().find(|p| p.key == key) {
            Some(param) => {
                param.value = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Current value of `key`, if it is part of the schema.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// All entries in schema order.
    pub fn snapshot(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// `(key, kind)` pairs in schema order, for sink metadata declaration.
    pub fn schema(&self) -> Vec<(&'static str, ParamKind)> {
        self.params.iter().map(|p| (p.key, p.kind)).collect()
    }

    /// Number of parameters in the schema.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the schema is empty (never true for the CE102M set).
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
