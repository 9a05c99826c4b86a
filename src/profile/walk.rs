//! Minimal parser for `snmpwalk`-style text dumps, producing
//! `(oid, type, value)` triples for the profile store to consume.
//!
//! This is deliberately not a MIB compiler: symbolic names are resolved
//! through a small built-in table of the columns this simulator's
//! behavior inference already knows about (see `profile::entry`).
//! Anything else symbolic is counted as skipped, not fatal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::snmp::{Oid, SnmpValue, TypeTag};

#[derive(Debug, Clone, PartialEq)]
pub struct WalkEntry {
    pub oid: Oid,
    pub type_tag: TypeTag,
    pub value: SnmpValue,
    pub symbolic_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub accepted: usize,
    pub skipped: usize,
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?:
            \.(?P<numeric>[0-9](?:[0-9.]*[0-9])?)
            |
            (?P<mib>[A-Za-z0-9_-]+)::(?P<sym>[A-Za-z0-9_-]+)(?P<suffix>(?:\.[0-9]+)*)
        )
        \s*=\s*
        (?P<type>[A-Za-z0-9_-]+)\s*:\s*
        (?P<value>.*)
        $
        ",
    )
    .unwrap()
});

static TICKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((\d+)\)").unwrap());
static NAMED_INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+").unwrap());

fn symbol_base_oid(mib: &str, symbol: &str) -> Option<Vec<u32>> {
    let key = format!("{}::{}", mib, symbol);
    let table: &[(&str, &[u32])] = &[
        ("SNMPv2-MIB::sysDescr", &[1, 3, 6, 1, 2, 1, 1, 1]),
        ("SNMPv2-MIB::sysObjectID", &[1, 3, 6, 1, 2, 1, 1, 2]),
        ("SNMPv2-MIB::sysUpTime", &[1, 3, 6, 1, 2, 1, 1, 3]),
        ("DISMAN-EVENT-MIB::sysUpTimeInstance", &[1, 3, 6, 1, 2, 1, 1, 3, 0]),
        ("SNMPv2-MIB::sysContact", &[1, 3, 6, 1, 2, 1, 1, 4]),
        ("SNMPv2-MIB::sysName", &[1, 3, 6, 1, 2, 1, 1, 5]),
        ("SNMPv2-MIB::sysLocation", &[1, 3, 6, 1, 2, 1, 1, 6]),
        ("SNMPv2-MIB::sysServices", &[1, 3, 6, 1, 2, 1, 1, 7]),
        ("IF-MIB::ifNumber", &[1, 3, 6, 1, 2, 1, 2, 1]),
        ("IF-MIB::ifInOctets", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 10]),
        ("IF-MIB::ifInUcastPkts", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 11]),
        ("IF-MIB::ifInErrors", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 14]),
        ("IF-MIB::ifOutOctets", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 16]),
        ("IF-MIB::ifOutUcastPkts", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 17]),
        ("IF-MIB::ifOutErrors", &[1, 3, 6, 1, 2, 1, 2, 2, 1, 20]),
        ("IF-MIB::ifHCInOctets", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6]),
        ("IF-MIB::ifHCOutOctets", &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10]),
        ("DOCS-IF-MIB::docsIfSigQSignalNoise", &[1, 3, 6, 1, 2, 1, 10, 127, 1, 1, 4, 1, 5]),
        ("HOST-RESOURCES-MIB::hrProcessorLoad", &[1, 3, 6, 1, 2, 1, 25, 3, 3, 1, 2]),
    ];
    table.iter().find(|(k, _)| *k == key).map(|(_, oid)| oid.to_vec())
}

fn parse_suffix(suffix: &str) -> Option<Vec<u32>> {
    suffix
        .trim_start_matches('.')
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok())
        .collect()
}

fn parse_value(type_token: &str, raw_value: &str) -> Option<(TypeTag, SnmpValue)> {
    let raw_value = raw_value.trim();
    match type_token.to_ascii_lowercase().as_str() {
        "string" => {
            let text = raw_value.trim_matches('"');
            Some((TypeTag::OctetString, SnmpValue::octet_string(text)))
        }
        "integer" | "integer32" => {
            let captured = NAMED_INT_RE.find(raw_value)?;
            let n: i32 = captured.as_str().parse().ok()?;
            Some((TypeTag::Integer, SnmpValue::Integer(n)))
        }
        "gauge32" | "gauge" => {
            let captured = NAMED_INT_RE.find(raw_value)?;
            let n: u32 = captured.as_str().parse().ok()?;
            Some((TypeTag::Gauge32, SnmpValue::Gauge32(n)))
        }
        "counter32" | "counter" => {
            let captured = NAMED_INT_RE.find(raw_value)?;
            let n: u32 = captured.as_str().parse().ok()?;
            Some((TypeTag::Counter32, SnmpValue::Counter32(n)))
        }
        "counter64" => {
            let captured = NAMED_INT_RE.find(raw_value)?;
            let n: u64 = captured.as_str().parse().ok()?;
            Some((TypeTag::Counter64, SnmpValue::Counter64(n)))
        }
        "timeticks" => {
            let captured = TICKS_RE.captures(raw_value)?;
            let ticks: u32 = captured.get(1)?.as_str().parse().ok()?;
            Some((TypeTag::TimeTicks, SnmpValue::TimeTicks(ticks)))
        }
        "hex-string" | "opaque" => {
            let bytes: Option<Vec<u8>> = raw_value
                .split_whitespace()
                .map(|pair| u8::from_str_radix(pair, 16).ok())
                .collect();
            let bytes = bytes?;
            if type_token.eq_ignore_ascii_case("opaque") {
                Some((TypeTag::Opaque, SnmpValue::Opaque(bytes)))
            } else {
                Some((TypeTag::OctetString, SnmpValue::OctetString(bytes)))
            }
        }
        "oid" => {
            let oid = Oid::parse(raw_value).ok()?;
            Some((TypeTag::ObjectIdentifier, SnmpValue::ObjectIdentifier(oid.into_components())))
        }
        "ipaddress" => {
            let mut octets = [0u8; 4];
            let parts: Vec<&str> = raw_value.split('.').collect();
            if parts.len() != 4 {
                return None;
            }
            for (i, part) in parts.iter().enumerate() {
                octets[i] = part.parse().ok()?;
            }
            Some((TypeTag::IpAddress, SnmpValue::IpAddress(octets)))
        }
        _ => None,
    }
}

/// Parses a full walk-file text body. Blank lines and `#` comments are
/// ignored; malformed or unresolvable lines are counted in `skipped`
/// rather than causing a parse failure.
pub fn parse_walk(input: &str) -> (Vec<WalkEntry>, WalkStats) {
    let mut entries = Vec::new();
    let mut stats = WalkStats::default();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = LINE_RE.captures(line) else {
            stats.skipped += 1;
            continue;
        };

        let oid_and_name = if let Some(numeric) = captures.name("numeric") {
            Oid::parse(numeric.as_str()).ok().map(|oid| (oid, None))
        } else {
            let mib = captures.name("mib").unwrap().as_str();
            let sym = captures.name("sym").unwrap().as_str();
            let suffix = captures.name("suffix").map(|m| m.as_str()).unwrap_or("");
            symbol_base_oid(mib, sym).and_then(|mut components| {
                let suffix_components = parse_suffix(suffix)?;
                components.extend(suffix_components);
                Some((Oid::new(components), Some(format!("{}::{}", mib, sym))))
            })
        };

        let Some((oid, symbolic_name)) = oid_and_name else {
            stats.skipped += 1;
            continue;
        };

        let type_token = captures.name("type").unwrap().as_str();
        let raw_value = captures.name("value").unwrap().as_str();

        match parse_value(type_token, raw_value) {
            Some((type_tag, value)) => {
                entries.push(WalkEntry { oid, type_tag, value, symbolic_name });
                stats.accepted += 1;
            }
            None => stats.skipped += 1,
        }
    }

    (entries, stats)
}
