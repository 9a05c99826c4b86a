//! Value simulator: turns a stored profile entry plus a snapshot
//! of device state into the `(type, value)` pair placed in a varbind.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::profile::entry::{Behavior, CounterWidth, ProfileEntry};
use crate::profile::DeviceClass;
use crate::snmp::{Oid, SnmpValue, TypeTag};

/// A read-only snapshot of the device state the simulator needs. Built
/// fresh by the device for every request; never stored.
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub class: DeviceClass,
    pub device_id: String,
    pub port: u16,
    pub uptime_ms: u64,
    pub last_access_ms: u64,
    pub interface_utilization: f64,
    pub signal_quality: f64,
    pub cpu_utilization: f64,
    /// Configured per-deployment salt, folded into every seeded RNG so
    /// two simulator instances with the same device ids still produce
    /// uncorrelated jitter.
    pub jitter_seed_salt: String,
}

impl DeviceView {
    fn uptime_s(&self) -> f64 {
        self.uptime_ms as f64 / 1000.0
    }
}

fn seeded_rng(device_id: &str, jitter_seed_salt: &str, oid: &Oid, now: DateTime<Utc>) -> StdRng {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    device_id.hash(&mut hasher);
    jitter_seed_salt.hash(&mut hasher);
    oid.to_string().hash(&mut hasher);
    now.timestamp().hash(&mut hasher);
    StdRng::seed_from_u64(hasher.finish())
}

/// Multiplier reflecting time-of-day load shape, UTC.
pub fn tod_factor(now: DateTime<Utc>) -> f64 {
    match now.hour() {
        0..=5 => 0.6,   // overnight
        6..=8 => 0.8,   // off-peak
        9..=16 => 1.0,  // business hours
        17..=19 => 1.3, // early evening
        _ => 1.5,       // peak evening
    }
}

fn signal_impact(signal_quality: f64) -> f64 {
    (2.0 - signal_quality).clamp(1.0, 1.3)
}

fn signal_band(class: &DeviceClass) -> (f64, f64) {
    if class.as_str().contains("cable") {
        (15.0, 45.0)
    } else {
        (0.0, 100.0)
    }
}

fn evaluate_traffic_counter(
    base_rate_bps: u64,
    width: CounterWidth,
    view: &DeviceView,
    oid: &Oid,
    now: DateTime<Utc>,
) -> SnmpValue {
    let mut rng = seeded_rng(&view.device_id, &view.jitter_seed_salt, oid, now);
    let variance = 1.0 + rng.gen_range(-0.05..=0.05);
    let total = ((base_rate_bps as f64 / 8.0)
        * view.uptime_s()
        * tod_factor(now)
        * signal_impact(view.signal_quality)
        * variance)
        .floor()
        .max(0.0) as u64;
    let wrapped = width.wrap(total);
    match width {
        CounterWidth::Width32 => SnmpValue::Counter32(wrapped as u32),
        CounterWidth::Width64 => SnmpValue::Counter64(wrapped),
    }
}

fn evaluate_packet_counter(base_pps: u64, view: &DeviceView, oid: &Oid, now: DateTime<Utc>) -> SnmpValue {
    let mut rng = seeded_rng(&view.device_id, &view.jitter_seed_salt, oid, now);
    let variance = 1.0 + rng.gen_range(-0.07..=0.07);
    let total = (base_pps as f64 * view.uptime_s() * tod_factor(now) * variance).floor().max(0.0) as u64;
    SnmpValue::Counter32((total % (1u64 << 32)) as u32)
}

fn evaluate_error_counter(base_rate: f64, burst_prob: f64, view: &DeviceView, oid: &Oid, now: DateTime<Utc>) -> SnmpValue {
    let mut rng = seeded_rng(&view.device_id, &view.jitter_seed_salt, oid, now);
    let utilization_impact = 1.0 + view.interface_utilization;
    let base = base_rate * view.uptime_s() * utilization_impact * signal_impact(view.signal_quality);
    let burst = if rng.gen_bool(burst_prob.clamp(0.0, 1.0)) { rng.gen_range(5.0..=15.0) } else { 0.0 };
    let total = (base + burst).floor().max(0.0) as u64;
    SnmpValue::Counter32((total % (1u64 << 32)) as u32)
}

fn evaluate_utilization_gauge(min: f64, max: f64, view: &DeviceView, oid: &Oid, now: DateTime<Utc>) -> SnmpValue {
    let mut rng = seeded_rng(&view.device_id, &view.jitter_seed_salt, oid, now);
    let span = max - min;
    let shape = (tod_factor(now) / 1.5).clamp(0.0, 1.0);
    let base = min + span * shape;
    let jitter = rng.gen_range(-0.10..=0.10) * span;
    let value = (base + jitter).clamp(min, max);
    SnmpValue::Gauge32(value.round() as u32)
}

fn evaluate_signal_gauge(nominal: f64, range: f64, view: &DeviceView, oid: &Oid, now: DateTime<Utc>) -> SnmpValue {
    let mut rng = seeded_rng(&view.device_id, &view.jitter_seed_salt, oid, now);
    let jitter = rng.gen_range(-range..=range);
    let load_penalty = view.interface_utilization * 2.0;
    let (lo, hi) = signal_band(&view.class);
    let value = (nominal + jitter - load_penalty).clamp(lo, hi);
    SnmpValue::Integer(value.round() as i32)
}

const ENUM_ROTATION_PERIOD_SECS: i64 = 300;

fn evaluate_enum(values: &[SnmpValue], device_id: &str, jitter_seed_salt: &str, oid: &Oid, now: DateTime<Utc>) -> SnmpValue {
    if values.is_empty() {
        return SnmpValue::Null;
    }
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    device_id.hash(&mut hasher);
    jitter_seed_salt.hash(&mut hasher);
    oid.to_string().hash(&mut hasher);
    let bucket = now.timestamp() / ENUM_ROTATION_PERIOD_SECS;
    bucket.hash(&mut hasher);
    let index = (hasher.finish() as usize) % values.len();
    values[index].clone()
}

/// Applies the behavior of `entry` against `view` at time `now` for
/// the given `oid`, producing the value that goes on the wire. `oid`
/// seeds the deterministic RNG so repeated calls for the same OID on
/// the same device stay plausibly correlated.
pub fn evaluate(entry: &ProfileEntry, view: &DeviceView, oid: &Oid, now: DateTime<Utc>) -> (TypeTag, SnmpValue) {
    let value = match &entry.behavior {
        Behavior::Static => entry.static_value.clone(),
        Behavior::UptimeTicks => SnmpValue::TimeTicks((view.uptime_ms / 10) as u32),
        Behavior::TrafficCounter { base_rate_bps, counter_width } => {
            evaluate_traffic_counter(*base_rate_bps, *counter_width, view, oid, now)
        }
        Behavior::PacketCounter { base_pps } => evaluate_packet_counter(*base_pps, view, oid, now),
        Behavior::ErrorCounter { base_rate, burst_prob } => {
            evaluate_error_counter(*base_rate, *burst_prob, view, oid, now)
        }
        Behavior::UtilizationGauge { min, max } => evaluate_utilization_gauge(*min, *max, view, oid, now),
        Behavior::SignalGauge { nominal, range } => evaluate_signal_gauge(*nominal, *range, view, oid, now),
        Behavior::Enum { values } => evaluate_enum(values, &view.device_id, &view.jitter_seed_salt, oid, now),
    };
    (value.type_tag(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::entry::CounterWidth;

    fn view() -> DeviceView {
        DeviceView {
            class: DeviceClass::new("cable_modem"),
            device_id: "cm-0001".to_string(),
            port: 30001,
            uptime_ms: 100_000,
            last_access_ms: 100_000,
            interface_utilization: 0.2,
            signal_quality: 0.9,
            cpu_utilization: 0.1,
            jitter_seed_salt: "test-salt".to_string(),
        }
    }

    fn business_hours() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn test_oid() -> Oid {
        Oid::parse("1.3.6.1.2.1.2.2.1.10.1").unwrap()
    }

    #[test]
    fn uptime_ticks_is_uptime_ms_over_ten() {
        let entry = ProfileEntry::new(SnmpValue::TimeTicks(0), Behavior::UptimeTicks);
        let (tag, value) = evaluate(&entry, &view(), &test_oid(), business_hours());
        assert_eq!(tag, TypeTag::TimeTicks);
        assert_eq!(value, SnmpValue::TimeTicks(10_000));
    }

    #[test]
    fn static_behavior_returns_stored_value() {
        let entry = ProfileEntry::new(SnmpValue::Integer(7), Behavior::Static);
        let (_, value) = evaluate(&entry, &view(), &test_oid(), business_hours());
        assert_eq!(value, SnmpValue::Integer(7));
    }

    #[test]
    fn traffic_counter_is_monotone_with_uptime() {
        let entry = ProfileEntry::new(
            SnmpValue::Counter32(0),
            Behavior::TrafficCounter { base_rate_bps: 1_000_000, counter_width: CounterWidth::Width32 },
        );
        let mut v1 = view();
        v1.uptime_ms = 100_000;
        let mut v2 = view();
        v2.uptime_ms = 110_000;

        let (_, a) = evaluate(&entry, &v1, &test_oid(), business_hours());
        let (_, b) = evaluate(&entry, &v2, &test_oid(), business_hours());
        let (SnmpValue::Counter32(a), SnmpValue::Counter32(b)) = (a, b) else { panic!("expected counter32") };
        assert!(b >= a, "counter must not decrease as uptime grows: {} then {}", a, b);

        let expected_base = (1_000_000.0_f64 / 8.0) * 10.0 * tod_factor(business_hours()) * 1.0;
        let diff = (b - a) as f64;
        assert!(diff >= expected_base * 0.9 * 1.0, "diff {} too small", diff);
        assert!(diff <= expected_base * 1.3 * 1.1, "diff {} too large", diff);
    }

    #[test]
    fn error_counter_never_negative() {
        let entry = ProfileEntry::new(
            SnmpValue::Counter32(0),
            Behavior::ErrorCounter { base_rate: 0.01, burst_prob: 0.0 },
        );
        let (_, value) = evaluate(&entry, &view(), &test_oid(), business_hours());
        assert!(matches!(value, SnmpValue::Counter32(_)));
    }

    #[test]
    fn utilization_gauge_stays_in_band() {
        let entry = ProfileEntry::new(SnmpValue::Gauge32(0), Behavior::UtilizationGauge { min: 5.0, max: 95.0 });
        for hour_offset in 0..24 {
            let now = business_hours() + chrono::Duration::hours(hour_offset);
            let (_, value) = evaluate(&entry, &view(), &test_oid(), now);
            let SnmpValue::Gauge32(v) = value else { panic!("expected gauge32") };
            assert!((5..=95).contains(&v), "{} out of band", v);
        }
    }

    #[test]
    fn signal_gauge_stays_within_cable_band() {
        let entry = ProfileEntry::new(SnmpValue::Integer(35), Behavior::SignalGauge { nominal: 35.0, range: 5.0 });
        let (_, value) = evaluate(&entry, &view(), &test_oid(), business_hours());
        let SnmpValue::Integer(v) = value else { panic!("expected integer") };
        assert!((15..=45).contains(&v), "{} out of cable SNR band", v);
    }

    #[test]
    fn enum_rotation_is_deterministic_within_bucket() {
        let values = vec![SnmpValue::Integer(1), SnmpValue::Integer(2), SnmpValue::Integer(3)];
        let entry = ProfileEntry::new(SnmpValue::Integer(1), Behavior::Enum { values });
        let (_, a) = evaluate(&entry, &view(), &test_oid(), business_hours());
        let (_, b) = evaluate(&entry, &view(), &test_oid(), business_hours());
        assert_eq!(a, b);
    }

    #[test]
    fn different_jitter_seed_salt_changes_the_jitter() {
        let entry = ProfileEntry::new(
            SnmpValue::Gauge32(0),
            Behavior::UtilizationGauge { min: 5.0, max: 95.0 },
        );
        let mut v1 = view();
        v1.jitter_seed_salt = "fleet-a".to_string();
        let mut v2 = view();
        v2.jitter_seed_salt = "fleet-b".to_string();

        let (_, a) = evaluate(&entry, &v1, &test_oid(), business_hours());
        let (_, b) = evaluate(&entry, &v2, &test_oid(), business_hours());
        assert_ne!(a, b, "two deployments with different salts must not land on identical jitter");
    }

    #[test]
    fn tod_factor_matches_declared_bands() {
        assert_eq!(tod_factor("2024-01-01T02:00:00Z".parse().unwrap()), 0.6);
        assert_eq!(tod_factor("2024-01-01T07:00:00Z".parse().unwrap()), 0.8);
        assert_eq!(tod_factor("2024-01-01T12:00:00Z".parse().unwrap()), 1.0);
        assert_eq!(tod_factor("2024-01-01T18:00:00Z".parse().unwrap()), 1.3);
        assert_eq!(tod_factor("2024-01-01T22:00:00Z".parse().unwrap()), 1.5);
    }
}
