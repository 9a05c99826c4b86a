//! snmp-sim - Large-scale SNMP v1/v2c device simulator
//!
//! Impersonates thousands of network devices (cable modems, CMTSs,
//! switches, routers) over UDP, each responding to GET, GETNEXT and
//! GETBULK requests with MIB-consistent, time-evolving values.

pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod profile;
pub mod sim;
pub mod simulate;
pub mod snmp;
pub mod utils;

pub use error::{Error, Result};

/// Simulator version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
