//! Device instance and request pipeline.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use super::fallback::{self, FallbackContext};
use crate::metrics::SimulatorMetrics;
use crate::profile::{DeviceClass, ProfileStore};
use crate::simulate::DeviceView;
use crate::snmp::{self, ErrorStatus, Message, Pdu, PduKind, SnmpValue, TypeTag, VarBind, Version};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Booting,
    Running,
    Stopping,
    Stopped,
}

struct MutableState {
    counters: HashMap<snmp::Oid, u64>,
    gauges: HashMap<snmp::Oid, i64>,
    last_access: Instant,
    lifecycle: Lifecycle,
}

/// One simulated network device, bound to one UDP port for its
/// lifetime. Counters, gauges and `last_access` are mutated only
/// through `&self` methods that take the internal lock, so concurrent
/// request handling on the same device serialises safely.
pub struct Device {
    pub id: String,
    pub class: DeviceClass,
    pub port: u16,
    pub community: String,
    pub mac: [u8; 6],
    uptime_epoch: Instant,
    state: Mutex<MutableState>,
    profiles: Arc<ProfileStore>,
    metrics: Option<Arc<SimulatorMetrics>>,
    bind_address: String,
    buffer_size: usize,
    jitter_seed_salt: String,
    shutdown: Notify,
    stopped: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub class: DeviceClass,
    pub port: u16,
    pub mac: [u8; 6],
    pub uptime_ms: u64,
    pub last_access_ms: u64,
    pub has_profile: bool,
    pub lifecycle: Lifecycle,
}

fn pdu_kind_label(kind: PduKind) -> &'static str {
    match kind {
        PduKind::Get => "get",
        PduKind::GetNext => "get_next",
        PduKind::GetBulk => "get_bulk",
        PduKind::Set => "set",
        PduKind::GetResponse => "get_response",
    }
}

fn derive_mac(id: &str, port: u16) -> [u8; 6] {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    port.hash(&mut hasher);
    let h = hasher.finish().to_be_bytes();
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&h[..6]);
    mac[0] = (mac[0] & 0xFE) | 0x02; // locally administered, unicast
    mac
}

fn derived_metric(device_id: &str, salt: &str, bucket: i64) -> f64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    device_id.hash(&mut hasher);
    salt.hash(&mut hasher);
    bucket.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

impl Device {
    pub fn new(id: String, class: DeviceClass, port: u16, community: String, profiles: Arc<ProfileStore>) -> Self {
        let mac = derive_mac(&id, port);
        Self {
            id,
            class,
            port,
            community,
            mac,
            uptime_epoch: Instant::now(),
            state: Mutex::new(MutableState {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                last_access: Instant::now(),
                lifecycle: Lifecycle::Booting,
            }),
            profiles,
            metrics: None,
            bind_address: "0.0.0.0".to_string(),
            buffer_size: 65535,
            jitter_seed_salt: String::new(),
            shutdown: Notify::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Attaches a metrics handle; decode/encode failures and
    /// per-PDU-type request counts are reported from this point on.
    pub fn with_metrics(mut self, metrics: Arc<SimulatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Overrides the local address the device's socket binds to.
    /// Defaults to `0.0.0.0`.
    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    /// Overrides the UDP receive buffer size. Defaults to 65535, the
    /// largest possible SNMP-over-UDP datagram.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the per-deployment salt folded into this device's seeded
    /// RNGs, so two simulator instances running the same device ids
    /// don't produce identical jitter.
    pub fn with_jitter_seed_salt(mut self, jitter_seed_salt: impl Into<String>) -> Self {
        self.jitter_seed_salt = jitter_seed_salt.into();
        self
    }

    fn touch(&self) {
        let mut state = self.state.lock().expect("device state lock poisoned");
        state.last_access = Instant::now();
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.state.lock().expect("device state lock poisoned").lifecycle = lifecycle;
    }

    pub fn set_counter_override(&self, oid: snmp::Oid, value: u64) {
        self.state.lock().expect("device state lock poisoned").counters.insert(oid, value);
    }

    pub fn set_gauge_override(&self, oid: snmp::Oid, value: i64) {
        self.state.lock().expect("device state lock poisoned").gauges.insert(oid, value);
    }

    pub fn has_profile(&self) -> bool {
        self.profiles.has_class(&self.class)
    }

    fn uptime_ms(&self) -> u64 {
        Instant::now().duration_since(self.uptime_epoch).as_millis() as u64
    }

    pub fn view(&self) -> DeviceView {
        let now = Utc::now();
        let bucket = now.timestamp() / 60;
        let last_access_ms = {
            let state = self.state.lock().expect("device state lock poisoned");
            Instant::now().duration_since(state.last_access).as_millis() as u64
        };
        DeviceView {
            class: self.class.clone(),
            device_id: self.id.clone(),
            port: self.port,
            uptime_ms: self.uptime_ms(),
            last_access_ms,
            interface_utilization: 0.1 + 0.5 * derived_metric(&self.id, "util", bucket),
            signal_quality: 0.6 + 0.35 * derived_metric(&self.id, "signal", bucket),
            cpu_utilization: 0.05 + 0.3 * derived_metric(&self.id, "cpu", bucket),
            jitter_seed_salt: self.jitter_seed_salt.clone(),
        }
    }

    fn fallback_ctx(&self) -> FallbackContext<'_> {
        FallbackContext {
            device_id: &self.id,
            port: self.port,
            class: self.class.as_str(),
            uptime_ticks: (self.uptime_ms() / 10) as u32,
        }
    }

    fn apply_overrides(&self, oid: &snmp::Oid, type_tag: TypeTag, value: SnmpValue) -> (TypeTag, SnmpValue) {
        let state = self.state.lock().expect("device state lock poisoned");
        match type_tag {
            TypeTag::Counter32 => {
                if let Some(&v) = state.counters.get(oid) {
                    return (type_tag, SnmpValue::Counter32(v as u32));
                }
            }
            TypeTag::Counter64 => {
                if let Some(&v) = state.counters.get(oid) {
                    return (type_tag, SnmpValue::Counter64(v));
                }
            }
            TypeTag::Gauge32 => {
                if let Some(&v) = state.gauges.get(oid) {
                    return (type_tag, SnmpValue::Gauge32(v as u32));
                }
            }
            _ => {}
        }
        (type_tag, value)
    }

    /// Resolves a single OID to a value: profile store first, built-in
    /// fallback table second. Returns `None` on a genuine miss.
    fn resolve_one(&self, oid: &snmp::Oid) -> Option<(TypeTag, SnmpValue)> {
        let view = self.view();
        let now = Utc::now();
        let resolved = match self.profiles.get(&self.class, oid, &view, now) {
            Ok((tag, value)) => Some((tag, value)),
            Err(_) => fallback::get(oid, &self.fallback_ctx()),
        };
        resolved.map(|(tag, value)| self.apply_overrides(oid, tag, value))
    }

    /// Resolves the OID strictly following `oid`, consulting the
    /// profile store then the fallback table's successor map.
    fn resolve_next(&self, oid: &snmp::Oid) -> Option<snmp::Oid> {
        match self.profiles.get_next(&self.class, oid) {
            Ok(next) => Some(next),
            Err(_) => fallback::successor(oid),
        }
    }

    fn next_triple(&self, oid: &snmp::Oid) -> Option<(snmp::Oid, TypeTag, SnmpValue)> {
        let next_oid = self.resolve_next(oid)?;
        let (tag, value) = self.resolve_one(&next_oid)?;
        Some((next_oid, tag, value))
    }

    fn chain(&self, start: &snmp::Oid, count: u32) -> Vec<(snmp::Oid, TypeTag, SnmpValue)> {
        let mut results = Vec::new();
        let mut current = start.clone();
        for _ in 0..count {
            match self.next_triple(&current) {
                Some((oid, tag, value)) => {
                    current = oid.clone();
                    results.push((oid, tag, value));
                }
                None => break,
            }
        }
        results
    }

    /// Direct GET against one OID. `no_such_object` on a genuine miss.
    pub fn get(&self, oid: &snmp::Oid) -> (TypeTag, SnmpValue) {
        self.resolve_one(oid).unwrap_or((TypeTag::NoSuchObject, SnmpValue::NoSuchObject))
    }

    /// Direct GETNEXT against one OID.
    pub fn get_next(&self, oid: &snmp::Oid) -> (snmp::Oid, TypeTag, SnmpValue) {
        self.next_triple(oid).unwrap_or_else(|| (oid.clone(), TypeTag::EndOfMibView, SnmpValue::EndOfMibView))
    }

    /// Direct GETBULK against one starting OID.
    pub fn get_bulk(&self, oid: &snmp::Oid, max_repetitions: u32) -> Vec<(snmp::Oid, TypeTag, SnmpValue)> {
        let results = self.chain(oid, max_repetitions);
        if results.is_empty() {
            vec![(oid.clone(), TypeTag::EndOfMibView, SnmpValue::EndOfMibView)]
        } else {
            results
        }
    }

    /// Walks the subtree rooted at `root`, stopping as soon as an
    /// entry falls outside it (walk returns only the subtree).
    pub fn walk(&self, root: &snmp::Oid) -> Vec<(snmp::Oid, TypeTag, SnmpValue)> {
        let mut results = Vec::new();
        let mut current = root.clone();
        loop {
            match self.next_triple(&current) {
                Some((oid, tag, value)) => {
                    if !(root.is_prefix_of(&oid) || &oid == root) {
                        break;
                    }
                    current = oid.clone();
                    results.push((oid, tag, value));
                }
                None => break,
            }
        }
        results
    }

    pub fn info(&self) -> DeviceInfo {
        let state = self.state.lock().expect("device state lock poisoned");
        DeviceInfo {
            id: self.id.clone(),
            class: self.class.clone(),
            port: self.port,
            mac: self.mac,
            uptime_ms: Instant::now().duration_since(self.uptime_epoch).as_millis() as u64,
            last_access_ms: Instant::now().duration_since(state.last_access).as_millis() as u64,
            has_profile: self.has_profile(),
            lifecycle: state.lifecycle,
        }
    }

    /// Runs the packet handler's pipeline against a decoded message,
    /// returning the response to send, or `None` to drop silently.
    pub fn handle_message(&self, message: &Message) -> Option<Message> {
        if message.community != self.community {
            trace!(device = %self.id, "dropping request with mismatched community");
            return None;
        }
        self.touch();

        let pdu = &message.pdu;
        if let Some(metrics) = &self.metrics {
            metrics.record_request(pdu_kind_label(pdu.kind));
        }
        let response_pdu = match pdu.kind {
            PduKind::Get => {
                let varbinds: Vec<VarBind> = pdu
                    .varbinds
                    .iter()
                    .map(|vb| match self.resolve_one(&vb.oid) {
                        Some((_, value)) => VarBind::new(vb.oid.clone(), value),
                        None => VarBind::new(vb.oid.clone(), SnmpValue::NoSuchObject),
                    })
                    .collect();
                Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
            }
            PduKind::GetNext => {
                let varbinds: Vec<VarBind> = pdu
                    .varbinds
                    .iter()
                    .map(|vb| {
                        let (oid, _, value) = self.get_next(&vb.oid);
                        VarBind::new(oid, value)
                    })
                    .collect();
                Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
            }
            PduKind::GetBulk => {
                let non_repeaters = (pdu.non_repeaters().max(0) as usize).min(pdu.varbinds.len());
                let max_repetitions = pdu.max_repetitions().max(0) as u32;
                let (non_rep_vbs, repeaters) = pdu.varbinds.split_at(non_repeaters);

                let mut varbinds = Vec::new();
                for vb in non_rep_vbs {
                    let (oid, _, value) = self.get_next(&vb.oid);
                    varbinds.push(VarBind::new(oid, value));
                }
                for vb in repeaters {
                    for (oid, _, value) in self.chain(&vb.oid, max_repetitions) {
                        varbinds.push(VarBind::new(oid, value));
                    }
                }
                if varbinds.is_empty() {
                    let start = pdu.varbinds.first().map(|vb| vb.oid.clone()).unwrap_or_else(|| snmp::Oid::new(vec![0]));
                    varbinds.push(VarBind::new(start, SnmpValue::EndOfMibView));
                }
                Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
            }
            PduKind::Set => Pdu::response(pdu.request_id, ErrorStatus::GenErr, 1, pdu.varbinds.clone()),
            PduKind::GetResponse => {
                debug!(device = %self.id, "ignoring unsolicited GetResponse");
                return None;
            }
        };

        let response_pdu = if message.version == Version::V1 {
            if let Some(index) = response_pdu.varbinds.iter().position(|vb| vb.value.is_exception()) {
                Pdu::response(pdu.request_id, ErrorStatus::NoSuchName, (index + 1) as i32, pdu.varbinds.clone())
            } else {
                response_pdu
            }
        } else {
            response_pdu
        };

        Some(Message::new(message.version, message.community.clone(), response_pdu))
    }

    /// Binds the device's UDP socket and serves requests until
    /// `stop()` is called. Returns once the receive loop exits.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let socket = UdpSocket::bind((self.bind_address.as_str(), self.port)).await?;
        self.set_lifecycle(Lifecycle::Running);
        debug!(device = %self.id, port = self.port, bind_address = %self.bind_address, "device running");

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let (len, peer) = result?;
                    self.handle_datagram(&socket, &buf[..len], peer).await;
                }
                _ = self.shutdown.notified() => break,
            }
        }

        self.set_lifecycle(Lifecycle::Stopping);
        drop(socket);
        self.set_lifecycle(Lifecycle::Stopped);
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn handle_datagram(&self, socket: &UdpSocket, bytes: &[u8], peer: SocketAddr) {
        let message = match snmp::decode_message(bytes) {
            Ok(message) => message,
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.decode_errors_total.inc();
                }
                warn!(device = %self.id, error = %err, "dropping undecodable packet");
                return;
            }
        };

        let Some(response) = self.handle_message(&message) else { return };

        match snmp::encode_message(&response) {
            Ok(wire) => {
                if let Err(err) = socket.send_to(&wire, peer).await {
                    warn!(device = %self.id, error = %err, "failed to send response");
                }
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.encode_errors_total.inc();
                }
                warn!(device = %self.id, error = %err, "failed to encode response");
            }
        }
    }

    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::{Oid, Pdu, VarBind};

    fn device(class: &str, profiles: Arc<ProfileStore>) -> Device {
        Device::new("cm-0001".to_string(), DeviceClass::new(class), 30001, "public".to_string(), profiles)
    }

    #[test]
    fn get_falls_back_to_builtin_table_without_profile() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let (tag, value) = dev.get(&oid);
        assert_eq!(tag, TypeTag::OctetString);
        assert_eq!(value, SnmpValue::octet_string("Motorola SB6141 DOCSIS 3.0 Cable Modem"));
    }

    #[test]
    fn get_returns_no_such_object_on_true_miss() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("9.9.9").unwrap();
        let (_, value) = dev.get(&oid);
        assert_eq!(value, SnmpValue::NoSuchObject);
    }

    #[test]
    fn handle_message_drops_mismatched_community() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let pdu = Pdu::get(1, vec![VarBind::new(oid, SnmpValue::Null)]);
        let message = Message::new(Version::V2c, "wrong-community", pdu);
        assert!(dev.handle_message(&message).is_none());
    }

    #[test]
    fn scenario_sysdescr_get_against_profile_less_device() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let pdu = Pdu::get(42, vec![VarBind::new(oid.clone(), SnmpValue::Null)]);
        let message = Message::new(Version::V2c, "public", pdu);
        let response = dev.handle_message(&message).unwrap();
        assert_eq!(response.pdu.request_id, 42);
        assert_eq!(response.pdu.varbinds.len(), 1);
        assert_eq!(response.pdu.varbinds[0].oid, oid);
        assert_eq!(response.pdu.varbinds[0].value, SnmpValue::octet_string("Motorola SB6141 DOCSIS 3.0 Cable Modem"));
    }

    #[test]
    fn scenario_v1_exception_maps_to_no_such_name() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("9.9.9").unwrap();
        let pdu = Pdu::get(7, vec![VarBind::new(oid.clone(), SnmpValue::Null)]);
        let message = Message::new(Version::V1, "public", pdu);
        let response = dev.handle_message(&message).unwrap();
        assert_eq!(response.pdu.error_status(), ErrorStatus::NoSuchName);
        assert_eq!(response.pdu.error_index(), 1);
        assert_eq!(response.pdu.varbinds[0].value, SnmpValue::Null);
        assert_eq!(response.pdu.varbinds[0].oid, oid);
    }

    #[test]
    fn scenario_getbulk_at_tail_returns_single_end_of_mib() {
        let store = Arc::new(ProfileStore::new());
        store
            .load_walk_profile(
                DeviceClass::new("cable_modem"),
                ".1.3.6.1.2.1.1.1.0 = STRING: \"only entry\"\n",
            )
            .unwrap();
        let dev = device("cable_modem", store);
        let last = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let pdu = Pdu::get_bulk(1, 0, 10, vec![VarBind::new(last.clone(), SnmpValue::Null)]);
        let message = Message::new(Version::V2c, "public", pdu);
        let response = dev.handle_message(&message).unwrap();
        assert_eq!(response.pdu.varbinds.len(), 1);
        assert_eq!(response.pdu.varbinds[0].value, SnmpValue::EndOfMibView);
        assert_eq!(response.pdu.varbinds[0].oid, last);
    }

    #[test]
    fn set_request_returns_gen_err() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("1.3.6.1.2.1.1.5.0").unwrap();
        let pdu = Pdu { kind: PduKind::Set, request_id: 9, field2: 0, field3: 0, varbinds: vec![VarBind::new(oid, SnmpValue::octet_string("x"))] };
        let message = Message::new(Version::V2c, "public", pdu);
        let response = dev.handle_message(&message).unwrap();
        assert_eq!(response.pdu.error_status(), ErrorStatus::GenErr);
    }

    #[test]
    fn walk_stays_within_requested_subtree() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let root = Oid::parse("1.3.6.1.2.1.2").unwrap();
        let results = dev.walk(&root);
        assert!(!results.is_empty());
        for (oid, _, _) in &results {
            assert!(root.is_prefix_of(oid));
        }
    }

    #[test]
    fn metrics_record_requests_and_decode_failures() {
        let metrics = Arc::new(crate::metrics::SimulatorMetrics::new().unwrap());
        let dev = device("cable_modem", Arc::new(ProfileStore::new())).with_metrics(metrics.clone());
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        let pdu = Pdu::get(1, vec![VarBind::new(oid, SnmpValue::Null)]);
        let message = Message::new(Version::V2c, "public", pdu);
        dev.handle_message(&message);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("pdu_type=\"get\""));
    }

    #[test]
    fn counter_override_is_applied_on_read() {
        let dev = device("cable_modem", Arc::new(ProfileStore::new()));
        let oid = Oid::parse("1.3.6.1.2.1.2.2.1.10.1").unwrap();
        dev.set_counter_override(oid.clone(), 999);
        let (_, value) = dev.get(&oid);
        assert_eq!(value, SnmpValue::Counter32(999));
    }
}
