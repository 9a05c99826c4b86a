//! Configuration for the SNMP device simulator.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub general: GeneralConfig,
    pub snmp: SnmpConfig,
    pub pool: PoolConfig,
    pub devices: Vec<DeviceSpec>,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub node_id: String,
    pub contact: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    pub bind_address: String,
    pub default_community: String,
    pub encode_buffer_size: usize,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            default_community: "public".to_string(),
            encode_buffer_size: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub fn as_range(&self) -> std::ops::Range<u16> {
        self.min..self.max
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.min < other.max && other.min < self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAssignmentConfig {
    pub class: String,
    pub range: PortRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub idle_timeout_secs: u64,
    pub max_devices: Option<usize>,
    pub port_assignments: Vec<PortAssignmentConfig>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1800,
            max_devices: None,
            port_assignments: vec![
                PortAssignmentConfig { class: "cable_modem".to_string(), range: PortRange { min: 30000, max: 38000 } },
                PortAssignmentConfig { class: "mta".to_string(), range: PortRange { min: 38000, max: 39500 } },
                PortAssignmentConfig { class: "switch".to_string(), range: PortRange { min: 39500, max: 39900 } },
                PortAssignmentConfig { class: "router".to_string(), range: PortRange { min: 39900, max: 39950 } },
                PortAssignmentConfig { class: "cmts".to_string(), range: PortRange { min: 39950, max: 39975 } },
                PortAssignmentConfig { class: "server".to_string(), range: PortRange { min: 39975, max: 40000 } },
            ],
        }
    }
}

/// One device population to auto-start: `count` devices of `class`,
/// loaded from `profile_source`, spread across `port_range`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub class: String,
    pub profile_source: String,
    pub port_range: PortRange,
    pub count: usize,
    pub community: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub sweep_interval_secs: u64,
    pub jitter_seed_salt: String,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { sweep_interval_secs: 60, jitter_seed_salt: "snmp-sim".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub max_size: u64,
    pub max_files: u32,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None, max_size: 100 * 1024 * 1024, max_files: 10, format: LogFormat::Compact }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "full")]
    Full,
}

impl SimulatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SimulatorConfig = toml::from_str(&contents).map_err(|e| Error::parse(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("SIMSNMP").separator("_"))
            .build()?;
        let config: SimulatorConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig {
                node_id: "snmp-sim-1".to_string(),
                contact: "admin@example.com".to_string(),
                location: "Customer Premises".to_string(),
            },
            snmp: SnmpConfig::default(),
            pool: PoolConfig::default(),
            devices: vec![DeviceSpec {
                class: "cable_modem".to_string(),
                profile_source: "demos/cable_modem.walk".to_string(),
                port_range: PortRange { min: 30000, max: 30010 },
                count: 10,
                community: None,
            }],
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.idle_timeout_secs == 0 {
            return Err(Error::parse("pool.idle_timeout_secs must be greater than zero"));
        }

        let assignments = &self.pool.port_assignments;
        for (i, a) in assignments.iter().enumerate() {
            if a.range.min >= a.range.max {
                return Err(Error::parse(format!("port range for class '{}' is empty or inverted", a.class)));
            }
            for b in &assignments[i + 1..] {
                if a.range.overlaps(&b.range) {
                    return Err(Error::parse(format!("port ranges for '{}' and '{}' overlap", a.class, b.class)));
                }
            }
        }

        for spec in &self.devices {
            if spec.port_range.min >= spec.port_range.max {
                return Err(Error::parse(format!("device spec for class '{}' has an empty port range", spec.class)));
            }
            if spec.count == 0 {
                return Err(Error::parse(format!("device spec for class '{}' has count 0", spec.class)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = SimulatorConfig::default_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_port_assignments_do_not_overlap() {
        let config = SimulatorConfig::default_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overlapping_port_assignments_are_rejected() {
        let mut config = SimulatorConfig::default_config();
        config.pool.port_assignments.push(PortAssignmentConfig {
            class: "bogus".to_string(),
            range: PortRange { min: 30005, max: 30015 },
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let mut config = SimulatorConfig::default_config();
        config.pool.idle_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = SimulatorConfig::default_config();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SimulatorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.general.node_id, config.general.node_id);
        assert_eq!(parsed.pool.port_assignments.len(), config.pool.port_assignments.len());
    }
}
