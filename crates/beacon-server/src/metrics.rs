// Registry metrics reported through the `metrics` facade
// Whatever recorder the host process installs receives these

use metrics::{counter, describe_counter, describe_gauge, gauge};

use beacon_registry::{Origin, RegistryMetrics};

pub const REGISTRATIONS_TOTAL: &str = "beacon_registry_registrations_total";
pub const UNREGISTRATIONS_TOTAL: &str = "beacon_registry_unregistrations_total";
pub const REGISTRY_SIZE: &str = "beacon_registry_size";
pub const PENDING_MUTATIONS: &str = "beacon_registry_pending_mutations";

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        REGISTRATIONS_TOTAL,
        "Total number of registrations applied, by origin"
    );
    describe_counter!(
        UNREGISTRATIONS_TOTAL,
        "Total number of registration copies removed, by origin"
    );
    describe_gauge!(REGISTRY_SIZE, "Number of distinct registered instance ids");
    describe_gauge!(
        PENDING_MUTATIONS,
        "Number of registry mutations waiting to be applied"
    );

    tracing::info!("Metrics initialized");
}

/// `RegistryMetrics` implementation backed by the `metrics` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeRegistryMetrics;

impl RegistryMetrics for FacadeRegistryMetrics {
    fn increment_registration_counter(&self, origin: Origin) -> anyhow::Result<()> {
        counter!(REGISTRATIONS_TOTAL, "origin" => origin.as_str()).increment(1);
        Ok(())
    }

    fn increment_unregistration_counter(&self, origin: Origin) -> anyhow::Result<()> {
        counter!(UNREGISTRATIONS_TOTAL, "origin" => origin.as_str()).increment(1);
        Ok(())
    }

    fn set_registry_size(&self, size: usize) -> anyhow::Result<()> {
        gauge!(REGISTRY_SIZE).set(size as f64);
        Ok(())
    }

    fn set_pending_mutations(&self, pending: usize) -> anyhow::Result<()> {
        gauge!(PENDING_MUTATIONS).set(pending as f64);
        Ok(())
    }
}
