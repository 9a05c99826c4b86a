//! Profile entries: the static-value-plus-behavior record the profile
//! store keeps for each OID, and the inference of behavior from OID
//! shape when a walk file is loaded.

use crate::snmp::{Oid, SnmpValue, TypeTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWidth {
    Width32,
    Width64,
}

impl CounterWidth {
    pub fn wrap(self, value: u64) -> u64 {
        match self {
            CounterWidth::Width32 => value % (1u64 << 32),
            CounterWidth::Width64 => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Static,
    TrafficCounter { base_rate_bps: u64, counter_width: CounterWidth },
    PacketCounter { base_pps: u64 },
    ErrorCounter { base_rate: f64, burst_prob: f64 },
    UtilizationGauge { min: f64, max: f64 },
    SignalGauge { nominal: f64, range: f64 },
    UptimeTicks,
    Enum { values: Vec<SnmpValue> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub static_value: SnmpValue,
    pub type_tag: TypeTag,
    pub behavior: Behavior,
}

impl ProfileEntry {
    pub fn new(static_value: SnmpValue, behavior: Behavior) -> Self {
        let type_tag = static_value.type_tag();
        Self { static_value, type_tag, behavior }
    }
}

fn has_prefix(oid: &Oid, prefix: &[u32]) -> bool {
    oid.components().starts_with(prefix)
}

fn column_of(oid: &Oid, table_prefix: &[u32]) -> Option<u32> {
    let comps = oid.components();
    if comps.len() <= table_prefix.len() || !comps.starts_with(table_prefix) {
        return None;
    }
    Some(comps[table_prefix.len()])
}

fn numeric_hint(value: &SnmpValue) -> Option<u64> {
    match value {
        SnmpValue::Counter32(n) => Some(*n as u64),
        SnmpValue::Counter64(n) => Some(*n),
        SnmpValue::Gauge32(n) => Some(*n as u64),
        SnmpValue::TimeTicks(n) => Some(*n as u64),
        SnmpValue::Integer(n) if *n >= 0 => Some(*n as u64),
        _ => None,
    }
}

const IF_TABLE: [u32; 9] = [1, 3, 6, 1, 2, 1, 2, 2, 1];
const IF_X_TABLE: [u32; 10] = [1, 3, 6, 1, 2, 1, 31, 1, 1, 1];
const SYS_UPTIME: [u32; 8] = [1, 3, 6, 1, 2, 1, 1, 3];
const DOCSIS_SIGNAL: [u32; 12] = [1, 3, 6, 1, 2, 1, 10, 127, 1, 1, 4, 1];
const HR_PROCESSOR_LOAD: [u32; 10] = [1, 3, 6, 1, 2, 1, 25, 3, 3, 1];

const DEFAULT_TRAFFIC_RATE_BPS: u64 = 1_000_000;
const DEFAULT_PACKET_RATE_PPS: u64 = 1_000;
const DEFAULT_ERROR_RATE: f64 = 0.01;
const DEFAULT_ERROR_BURST_PROB: f64 = 0.05;
const DEFAULT_UTILIZATION_MIN: f64 = 5.0;
const DEFAULT_UTILIZATION_MAX: f64 = 95.0;
const DEFAULT_SIGNAL_RANGE: f64 = 5.0;

/// Infers a `Behavior` for an entry from its OID shape and declared
/// type, per the profile-store loading rules. The static value found
/// in the walk line doubles as the baseline rate/nominal parameter
/// when one is present and numeric; otherwise a flat default is used.
pub fn infer_behavior(oid: &Oid, type_tag: TypeTag, static_value: &SnmpValue) -> Behavior {
    if has_prefix(oid, &SYS_UPTIME) && oid.components().get(SYS_UPTIME.len()) == Some(&0) {
        return Behavior::UptimeTicks;
    }

    if has_prefix(oid, &DOCSIS_SIGNAL) {
        // 1.3.6.1.2.1.10.127.1.1.4.1.5.* - docsIfSigQSignalNoise
        if oid.components().get(DOCSIS_SIGNAL.len()) == Some(&5) {
            let nominal = numeric_hint(static_value).map(|v| v as f64).unwrap_or(35.0);
            return Behavior::SignalGauge { nominal, range: DEFAULT_SIGNAL_RANGE };
        }
    }

    if has_prefix(oid, &HR_PROCESSOR_LOAD) && oid.components().get(HR_PROCESSOR_LOAD.len()) == Some(&2) {
        return Behavior::UtilizationGauge { min: DEFAULT_UTILIZATION_MIN, max: DEFAULT_UTILIZATION_MAX };
    }

    if let Some(column) = column_of(oid, &IF_TABLE) {
        match column {
            10 | 16 => {
                let base_rate_bps = numeric_hint(static_value).unwrap_or(DEFAULT_TRAFFIC_RATE_BPS);
                return Behavior::TrafficCounter { base_rate_bps, counter_width: CounterWidth::Width32 };
            }
            11 | 17 => {
                let base_pps = numeric_hint(static_value).unwrap_or(DEFAULT_PACKET_RATE_PPS);
                return Behavior::PacketCounter { base_pps };
            }
            14 | 20 => {
                return Behavior::ErrorCounter { base_rate: DEFAULT_ERROR_RATE, burst_prob: DEFAULT_ERROR_BURST_PROB };
            }
            _ => {}
        }
    }

    if let Some(column) = column_of(oid, &IF_X_TABLE) {
        if column == 6 || column == 10 {
            let base_rate_bps = numeric_hint(static_value).unwrap_or(DEFAULT_TRAFFIC_RATE_BPS);
            return Behavior::TrafficCounter { base_rate_bps, counter_width: CounterWidth::Width64 };
        }
    }

    let _ = type_tag;
    Behavior::Static
}
