//! Device pool: lazily creates and reclaims device instances,
//! keyed by the UDP port they're contacted on.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::device::Device;
use crate::metrics::SimulatorMetrics;
use crate::profile::{DeviceClass, ProfileStore};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub active_devices: usize,
    pub max_devices: Option<usize>,
}

/// Maps disjoint UDP port ranges to the device class simulated there.
#[derive(Debug, Clone)]
pub struct PortAssignment {
    pub range: Range<u16>,
    pub class: DeviceClass,
}

pub struct DevicePool {
    active: DashMap<u16, Arc<Device>>,
    port_assignments: Vec<PortAssignment>,
    idle_timeout: Duration,
    max_devices: Option<usize>,
    default_community: String,
    profiles: Arc<ProfileStore>,
    metrics: Option<Arc<SimulatorMetrics>>,
    bind_address: String,
    buffer_size: usize,
    jitter_seed_salt: String,
}

impl DevicePool {
    pub fn new(
        profiles: Arc<ProfileStore>,
        port_assignments: Vec<PortAssignment>,
        idle_timeout: Duration,
        max_devices: Option<usize>,
        default_community: impl Into<String>,
    ) -> Self {
        Self {
            active: DashMap::new(),
            port_assignments,
            idle_timeout,
            max_devices,
            default_community: default_community.into(),
            profiles,
            metrics: None,
            bind_address: "0.0.0.0".to_string(),
            buffer_size: 65535,
            jitter_seed_salt: String::new(),
        }
    }

    /// Attaches a metrics handle; the pool gauge and rejection counter
    /// are kept in sync with `active` from this point on.
    pub fn with_metrics(mut self, metrics: Arc<SimulatorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Overrides the local address new devices bind their sockets to.
    /// Defaults to `0.0.0.0`.
    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    /// Overrides the UDP buffer size newly created devices allocate.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Overrides the per-deployment salt passed to newly created
    /// devices for jitter seeding.
    pub fn with_jitter_seed_salt(mut self, jitter_seed_salt: impl Into<String>) -> Self {
        self.jitter_seed_salt = jitter_seed_salt.into();
        self
    }

    fn configure_device(&self, mut device: Device) -> Device {
        device = device.with_bind_address(self.bind_address.clone());
        device = device.with_buffer_size(self.buffer_size);
        device = device.with_jitter_seed_salt(self.jitter_seed_salt.clone());
        if let Some(metrics) = &self.metrics {
            device = device.with_metrics(metrics.clone());
        }
        device
    }

    fn class_for_port(&self, port: u16) -> Option<DeviceClass> {
        self.port_assignments.iter().find(|a| a.range.contains(&port)).map(|a| a.class.clone())
    }

    fn spawn_device(&self, device: Arc<Device>, port: u16) {
        let task_device = device.clone();
        tokio::spawn(async move {
            if let Err(err) = task_device.run().await {
                warn!(port, error = %err, "device task exited with error");
            }
        });
    }

    /// Returns the device bound to `port`, creating it on first use.
    /// Race-free: concurrent callers for the same port observe the
    /// same device and the socket is bound exactly once.
    pub async fn get_or_create(&self, port: u16) -> Result<Arc<Device>> {
        if let Some(existing) = self.active.get(&port) {
            return Ok(existing.clone());
        }

        let class = self.class_for_port(port).ok_or(Error::UnknownPortRange(port))?;

        match self.active.entry(port) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                if let Some(max) = self.max_devices {
                    if self.active.len() >= max {
                        if let Some(metrics) = &self.metrics {
                            metrics.pool_full_total.inc();
                        }
                        return Err(Error::PoolFull(self.active.len()));
                    }
                }
                let id = format!("{}_{}", class.as_str(), port);
                let device = Device::new(id, class, port, self.default_community.clone(), self.profiles.clone());
                let device = Arc::new(self.configure_device(device));
                e.insert(device.clone());
                self.spawn_device(device.clone(), port);
                self.sync_gauge();
                Ok(device)
            }
        }
    }

    pub fn stop(&self, port: u16) -> bool {
        if let Some((_, device)) = self.active.remove(&port) {
            device.stop();
            self.sync_gauge();
            true
        } else {
            false
        }
    }

    fn sync_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.pool_devices_active.set(self.active.len() as i64);
        }
    }

    /// Stops every device whose `last_access` is older than
    /// `idle_timeout`. Returns the number reclaimed.
    pub fn sweep(&self) -> usize {
        let idle_ms = self.idle_timeout.as_millis() as u64;
        let stale: Vec<u16> = self
            .active
            .iter()
            .filter_map(|entry| {
                let info = entry.value().info();
                if info.last_access_ms >= idle_ms {
                    Some(*entry.key())
                } else {
                    None
                }
            })
            .collect();

        for port in &stale {
            self.stop(*port);
        }
        if !stale.is_empty() {
            info!(reclaimed = stale.len(), "idle sweep reclaimed devices");
        }
        stale.len()
    }

    /// Instantiates up to `count` devices of `class` across
    /// `port_range`, skipping ports already occupied. Returns the
    /// number actually started.
    pub async fn start_population(
        &self,
        class: DeviceClass,
        port_range: Range<u16>,
        count: usize,
        community: impl Into<String>,
    ) -> usize {
        let community = community.into();
        let mut started = 0;
        for port in port_range.take(count) {
            if self.active.contains_key(&port) {
                continue;
            }
            if let Some(max) = self.max_devices {
                if self.active.len() >= max {
                    break;
                }
            }
            if let Entry::Vacant(e) = self.active.entry(port) {
                let id = format!("{}_{}", class.as_str(), port);
                let device = Device::new(id, class.clone(), port, community.clone(), self.profiles.clone());
                let device = Arc::new(self.configure_device(device));
                e.insert(device.clone());
                self.spawn_device(device, port);
                started += 1;
            }
        }
        self.sync_gauge();
        started
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats { active_devices: self.active.len(), max_devices: self.max_devices }
    }

    pub fn active_ports(&self) -> Vec<u16> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignments() -> Vec<PortAssignment> {
        vec![PortAssignment { range: 40100..40110, class: DeviceClass::new("cable_modem") }]
    }

    #[tokio::test]
    async fn unknown_port_range_is_rejected() {
        let pool = DevicePool::new(Arc::new(ProfileStore::new()), assignments(), Duration::from_secs(1800), None, "public");
        let result = pool.get_or_create(9999).await;
        assert!(matches!(result, Err(Error::UnknownPortRange(9999))));
    }

    #[tokio::test]
    async fn get_or_create_is_race_free() {
        let pool = Arc::new(DevicePool::new(
            Arc::new(ProfileStore::new()),
            assignments(),
            Duration::from_secs(1800),
            None,
            "public",
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.get_or_create(40101).await.unwrap() }));
        }
        let devices: Vec<Arc<Device>> = futures_join_all(handles).await;
        let first_id = devices[0].id.clone();
        for device in &devices {
            assert_eq!(device.id, first_id);
            assert!(Arc::ptr_eq(device, &devices[0]));
        }
        pool.stop(40101);
    }

    async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<Arc<Device>>>) -> Vec<Arc<Device>> {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn pool_full_rejects_new_devices() {
        let pool = DevicePool::new(
            Arc::new(ProfileStore::new()),
            assignments(),
            Duration::from_secs(1800),
            Some(1),
            "public",
        );
        pool.get_or_create(40102).await.unwrap();
        let result = pool.get_or_create(40103).await;
        assert!(matches!(result, Err(Error::PoolFull(1))));
    }

    #[tokio::test]
    async fn stop_removes_device_from_active_set() {
        let pool = DevicePool::new(Arc::new(ProfileStore::new()), assignments(), Duration::from_secs(1800), None, "public");
        pool.get_or_create(40104).await.unwrap();
        assert!(pool.stop(40104));
        assert_eq!(pool.stats().active_devices, 0);
    }

    #[tokio::test]
    async fn metrics_gauge_and_rejection_counter_track_pool_state() {
        eprintln!("DBG 1");
        let metrics = Arc::new(SimulatorMetrics::new().unwrap());
        eprintln!("DBG 2");
        let pool = DevicePool::new(Arc::new(ProfileStore::new()), assignments(), Duration::from_secs(1800), Some(1), "public")
            .with_metrics(metrics.clone());
        eprintln!("DBG 3");

        pool.get_or_create(40105).await.unwrap();
        eprintln!("DBG 4");
        assert_eq!(metrics.pool_devices_active.get(), 1);
        eprintln!("DBG 5");

        assert!(pool.get_or_create(40106).await.is_err());
        eprintln!("DBG 6");
        assert_eq!(metrics.pool_full_total.get(), 1);
        eprintln!("DBG 7");

        pool.stop(40105);
        eprintln!("DBG 8");
        assert_eq!(metrics.pool_devices_active.get(), 0);
        eprintln!("DBG 9");
    }

    #[tokio::test]
    async fn configured_jitter_seed_salt_and_buffer_size_reach_new_devices() {
        let pool = DevicePool::new(Arc::new(ProfileStore::new()), assignments(), Duration::from_secs(1800), None, "public")
            .with_jitter_seed_salt("fleet-a")
            .with_buffer_size(4096);
        let device = pool.get_or_create(40107).await.unwrap();
        assert_eq!(device.view().jitter_seed_salt, "fleet-a");
        pool.stop(40107);
    }
}
