//! Built-in fallback OID table: answers a fixed, minimal set
//! of OIDs when a device's class has no loaded profile, so a walk
//! still produces something sane. The same static table drives both
//! point lookup and GETNEXT succession, so the two views cannot
//! diverge.

use crate::snmp::{Oid, SnmpValue, TypeTag};

/// Per-device context the fallback table needs to fill in
/// device-specific fields (description, id, live uptime).
pub struct FallbackContext<'a> {
    pub device_id: &'a str,
    pub port: u16,
    pub class: &'a str,
    pub uptime_ticks: u32,
}

fn class_description(class: &str) -> &'static str {
    match class {
        "cable_modem" => "Motorola SB6141 DOCSIS 3.0 Cable Modem",
        "cmts" => "Cisco uBR10012 Cable Modem Termination System",
        "switch" => "Cisco Catalyst 3850 Switch",
        "router" => "Cisco ASR 1001-X Router",
        "mta" => "ARRIS Multimedia Terminal Adapter",
        _ => "Generic SNMP Network Device",
    }
}

/// The fixed OID list, in ascending order, and one resolver per entry.
/// `if_table_row` handles the `1.3.6.1.2.1.2.2.1.{1..20}.1` column
/// family, where the last component selects the column.
fn if_table_row(column: u32, ctx: &FallbackContext) -> Option<(TypeTag, SnmpValue)> {
    let value = match column {
        1 => SnmpValue::Integer(1),                      // ifIndex
        2 => SnmpValue::octet_string(format!("eth0-{}", ctx.port)), // ifDescr
        3 => SnmpValue::Integer(6),                       // ifType: ethernetCsmacd
        4 => SnmpValue::Integer(1500),                    // ifMtu
        5 => SnmpValue::Gauge32(100_000_000),             // ifSpeed
        6 => SnmpValue::octet_string([0u8, 0, 0, 0, 0, 0]), // ifPhysAddress placeholder
        7 => SnmpValue::Integer(1),                       // ifAdminStatus: up
        8 => SnmpValue::Integer(1),                       // ifOperStatus: up
        9 => SnmpValue::TimeTicks(0),                     // ifLastChange
        10 => SnmpValue::Counter32(0),                    // ifInOctets
        11 => SnmpValue::Counter32(0),                    // ifInUcastPkts
        12 => SnmpValue::Counter32(0),                    // ifInNUcastPkts
        13 => SnmpValue::Counter32(0),                    // ifInDiscards
        14 => SnmpValue::Counter32(0),                    // ifInErrors
        15 => SnmpValue::Counter32(0),                    // ifInUnknownProtos
        16 => SnmpValue::Counter32(0),                    // ifOutOctets
        17 => SnmpValue::Counter32(0),                    // ifOutUcastPkts
        18 => SnmpValue::Counter32(0),                    // ifOutNUcastPkts
        19 => SnmpValue::Counter32(0),                    // ifOutDiscards
        20 => SnmpValue::Counter32(0),                    // ifOutErrors
        _ => return None,
    };
    Some((value.type_tag(), value))
}

const SYSTEM_GROUP_LEN: usize = 9;

/// The ordered list of OIDs this table answers, as component suffixes
/// appended to `1.3.6.1.2.1`.
fn ordered_suffixes() -> Vec<Vec<u32>> {
    let mut suffixes = vec![
        vec![1, 1, 0],
        vec![1, 2, 0],
        vec![1, 3, 0],
        vec![1, 4, 0],
        vec![1, 5, 0],
        vec![1, 6, 0],
        vec![1, 7, 0],
        vec![2, 1, 0],
    ];
    for column in 1..=20u32 {
        suffixes.push(vec![2, 2, 1, column, 1]);
    }
    suffixes
}

fn base() -> Vec<u32> {
    vec![1, 3, 6, 1, 2, 1]
}

fn full_oid(suffix: &[u32]) -> Oid {
    let mut components = base();
    components.extend_from_slice(suffix);
    Oid::new(components)
}

/// Resolves a single fallback OID, if the table covers it.
pub fn get(oid: &Oid, ctx: &FallbackContext) -> Option<(TypeTag, SnmpValue)> {
    let comps = oid.components();
    let prefix = base();
    if comps.len() <= prefix.len() || comps[..prefix.len()] != prefix[..] {
        return None;
    }
    let suffix = &comps[prefix.len()..];

    match suffix {
        [1, 1, 0] => {
            let v = SnmpValue::octet_string(class_description(ctx.class));
            Some((v.type_tag(), v))
        }
        [1, 2, 0] => {
            let oid = Oid::parse("1.3.6.1.4.1.4491.2.4.1").unwrap();
            let v = SnmpValue::ObjectIdentifier(oid.into_components());
            Some((v.type_tag(), v))
        }
        [1, 3, 0] => {
            let v = SnmpValue::TimeTicks(ctx.uptime_ticks);
            Some((v.type_tag(), v))
        }
        [1, 4, 0] => {
            let v = SnmpValue::octet_string("admin@example.com");
            Some((v.type_tag(), v))
        }
        [1, 5, 0] => {
            let v = SnmpValue::octet_string(if ctx.device_id.is_empty() {
                format!("device_{}", ctx.port)
            } else {
                ctx.device_id.to_string()
            });
            Some((v.type_tag(), v))
        }
        [1, 6, 0] => {
            let v = SnmpValue::octet_string("Customer Premises");
            Some((v.type_tag(), v))
        }
        [1, 7, 0] => {
            let v = SnmpValue::Integer(2);
            Some((v.type_tag(), v))
        }
        [2, 1, 0] => {
            let v = SnmpValue::Integer(2);
            Some((v.type_tag(), v))
        }
        [2, 2, 1, column, 1] => if_table_row(*column, ctx),
        _ => None,
    }
}

/// The GETNEXT successor for a fallback OID, or any OID that is a
/// prefix of the table's root (`1`, `1.3`, ..., `1.3.6.1.2.1.1`), in
/// which case the walk enters the table at its first entry. Returns
/// `None` at end-of-table.
pub fn successor(oid: &Oid) -> Option<Oid> {
    let suffixes = ordered_suffixes();
    let mut ordered: Vec<Oid> = suffixes.iter().map(|s| full_oid(s)).collect();
    ordered.sort();

    match ordered.binary_search(oid) {
        Ok(idx) => ordered.get(idx + 1).cloned(),
        Err(idx) => {
            if idx == 0 {
                if let Some(first) = ordered.first() {
                    if oid.is_prefix_of(first) || oid < first {
                        return Some(first.clone());
                    }
                }
            }
            ordered.get(idx).cloned()
        }
    }
}
