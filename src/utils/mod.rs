//! Ambient utilities: logging setup.

pub mod logger;

pub use logger::setup_logging;
