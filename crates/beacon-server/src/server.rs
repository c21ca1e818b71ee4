//! Registry lifecycle for an embedding process

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use beacon_registry::SourcedRegistry;

use crate::bootstrap::load_bootstrap_file;
use crate::config::Configuration;
use crate::metrics::{FacadeRegistryMetrics, init_metrics};

/// A running registry wired to configuration, metrics and bootstrap data
pub struct BeaconServer {
    configuration: Configuration,
    registry: SourcedRegistry,
}

impl BeaconServer {
    /// Build the registry and run the bootstrap loader when enabled
    ///
    /// Logging is left to the caller (see `init_logging`) since it installs
    /// a process-wide subscriber.
    pub async fn start(configuration: Configuration) -> anyhow::Result<Self> {
        let registry_config = configuration
            .registry()
            .context("Invalid registry configuration")?;
        let bootstrap_config = configuration
            .bootstrap()
            .context("Invalid bootstrap configuration")?;

        init_metrics();
        let name = registry_config.name.clone();
        let registry =
            SourcedRegistry::with_config(registry_config, Arc::new(FacadeRegistryMetrics));

        if bootstrap_config.enabled {
            let path = bootstrap_config
                .path
                .as_deref()
                .context("bootstrap.enabled is set but bootstrap.path is missing")?;
            let loaded = load_bootstrap_file(&registry, path)
                .await
                .with_context(|| format!("Failed to load bootstrap file {}", path.display()))?;
            info!("[{}] Bootstrapped {} instances", name, loaded);
        }

        info!("[{}] Beacon server started", name);
        Ok(Self {
            configuration,
            registry,
        })
    }

    pub fn registry(&self) -> &SourcedRegistry {
        &self.registry
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Complete all interest streams and stop the registry; idempotent
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
