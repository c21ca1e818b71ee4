//! Metrics collaborator for the registry
//!
//! The registry reports through this trait and never lets a failure here
//! affect a mutation: errors are logged at `warn` and dropped.

use crate::source::Origin;

/// Sink for registry metrics
pub trait RegistryMetrics: Send + Sync {
    /// Called for every applied registration
    fn increment_registration_counter(&self, origin: Origin) -> anyhow::Result<()>;

    /// Called for every registration copy actually removed
    fn increment_unregistration_counter(&self, origin: Origin) -> anyhow::Result<()>;

    /// Called when the number of distinct instance ids changes
    fn set_registry_size(&self, size: usize) -> anyhow::Result<()>;

    /// Number of mutations waiting for the serialized worker
    fn set_pending_mutations(&self, _pending: usize) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Metrics sink that records nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRegistryMetrics;

impl RegistryMetrics for NoopRegistryMetrics {
    fn increment_registration_counter(&self, _origin: Origin) -> anyhow::Result<()> {
        Ok(())
    }

    fn increment_unregistration_counter(&self, _origin: Origin) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_registry_size(&self, _size: usize) -> anyhow::Result<()> {
        Ok(())
    }
}
