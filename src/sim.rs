//! Top-level orchestrator: owns the profile store and device pool,
//! starts configured device populations, and runs the periodic idle
//! sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SimulatorConfig;
use crate::metrics::SimulatorMetrics;
use crate::pool::{DevicePool, PortAssignment};
use crate::profile::{DeviceClass, MemoryStats, ProfileStore};
use crate::pool::PoolStats;
use crate::Result;

/// Simulator lifecycle / population events, emitted over an
/// unbounded channel for a caller (the CLI, tests) to consume.
#[derive(Debug, Clone)]
pub enum SimulatorEvent {
    Started,
    Stopped,
    PopulationStarted { class: String, started: usize },
    ProfileLoadFailed { class: String, reason: String },
    SweepReclaimed { count: usize },
}

#[derive(Debug, Clone)]
pub struct SimulatorInfo {
    pub node_id: String,
    pub pool: PoolStats,
    pub profiles: MemoryStats,
}

pub struct Simulator {
    config: SimulatorConfig,
    profiles: Arc<ProfileStore>,
    pool: Arc<DevicePool>,
    metrics: Arc<SimulatorMetrics>,
    event_tx: mpsc::UnboundedSender<SimulatorEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SimulatorEvent>>,
    sweep_task: Option<JoinHandle<()>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let profiles = Arc::new(ProfileStore::new());
        let metrics = Arc::new(SimulatorMetrics::new().expect("metric registration cannot fail with fixed, unique names"));
        let assignments = config
            .pool
            .port_assignments
            .iter()
            .map(|a| PortAssignment { range: a.range.as_range(), class: DeviceClass::new(a.class.clone()) })
            .collect();
        let pool = Arc::new(
            DevicePool::new(
                profiles.clone(),
                assignments,
                Duration::from_secs(config.pool.idle_timeout_secs),
                config.pool.max_devices,
                config.snmp.default_community.clone(),
            )
            .with_metrics(metrics.clone())
            .with_bind_address(config.snmp.bind_address.clone())
            .with_buffer_size(config.snmp.encode_buffer_size)
            .with_jitter_seed_salt(config.performance.jitter_seed_salt.clone()),
        );
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self { config, profiles, pool, metrics, event_tx, event_rx: Some(event_rx), sweep_task: None }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SimulatorEvent>> {
        self.event_rx.take()
    }

    pub fn pool(&self) -> Arc<DevicePool> {
        self.pool.clone()
    }

    pub fn profiles(&self) -> Arc<ProfileStore> {
        self.profiles.clone()
    }

    pub fn metrics(&self) -> Arc<SimulatorMetrics> {
        self.metrics.clone()
    }

    /// Loads every configured profile source and starts its device
    /// population, then starts the periodic idle sweep. A device class
    /// with no loaded profile still serves requests from the built-in
    /// fallback table, so a profile-load failure is logged and
    /// reported as an event rather than aborting startup.
    pub async fn start(&mut self) -> Result<()> {
        info!(node_id = %self.config.general.node_id, "starting simulator");

        for spec in self.config.devices.clone() {
            let class = DeviceClass::new(spec.class.clone());
            match std::fs::read_to_string(&spec.profile_source) {
                Ok(source) => match self.profiles.load_walk_profile(class.clone(), &source) {
                    Ok(stats) => {
                        self.metrics.profile_reloads_total.inc();
                        info!(class = %spec.class, accepted = stats.accepted, skipped = stats.skipped, "profile loaded");
                    }
                    Err(err) => {
                        warn!(class = %spec.class, error = %err, "profile load failed");
                        let _ = self.event_tx.send(SimulatorEvent::ProfileLoadFailed { class: spec.class.clone(), reason: err.to_string() });
                    }
                },
                Err(err) => {
                    warn!(class = %spec.class, path = %spec.profile_source, error = %err, "profile source unreadable");
                    let _ = self.event_tx.send(SimulatorEvent::ProfileLoadFailed { class: spec.class.clone(), reason: err.to_string() });
                }
            }

            let community = spec.community.clone().unwrap_or_else(|| self.config.snmp.default_community.clone());
            let started = self.pool.start_population(class, spec.port_range.as_range(), spec.count, community).await;
            info!(class = %spec.class, started, requested = spec.count, "device population started");
            let _ = self.event_tx.send(SimulatorEvent::PopulationStarted { class: spec.class.clone(), started });
        }

        self.start_sweep_task();
        let _ = self.event_tx.send(SimulatorEvent::Started);
        info!("simulator started");
        Ok(())
    }

    fn start_sweep_task(&mut self) {
        let pool = self.pool.clone();
        let event_tx = self.event_tx.clone();
        let interval = Duration::from_secs(self.config.performance.sweep_interval_secs.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reclaimed = pool.sweep();
                if reclaimed > 0 {
                    let _ = event_tx.send(SimulatorEvent::SweepReclaimed { count: reclaimed });
                }
            }
        });
        self.sweep_task = Some(task);
    }

    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping simulator");
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
        for port in self.pool.active_ports() {
            self.pool.stop(port);
        }
        let _ = self.event_tx.send(SimulatorEvent::Stopped);
        info!("simulator stopped");
        Ok(())
    }

    pub fn info(&self) -> SimulatorInfo {
        SimulatorInfo {
            node_id: self.config.general.node_id.clone(),
            pool: self.pool.stats(),
            profiles: self.profiles.memory_stats(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
    }
}
