//! Beacon Server - embeddable registry bootstrap
//!
//! This crate wires the registry into a running process:
//! - Layered configuration (YAML file plus `BEACON_` environment overrides)
//! - Logging initialization
//! - `metrics` facade reporting
//! - Bootstrap loading of instance records from a file
//! - Registry lifecycle

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod server;

pub use bootstrap::load_bootstrap_file;
pub use self::config::{BootstrapConfig, Configuration, LoggingConfig};
pub use logging::{LoggingGuard, init_logging};
pub use self::metrics::{FacadeRegistryMetrics, init_metrics};
pub use server::BeaconServer;
