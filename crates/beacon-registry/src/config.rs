//! Registry configuration

use serde::{Deserialize, Serialize};

use beacon_common::{DEFAULT_QUEUE_WARN_THRESHOLD, DEFAULT_REGISTRY_NAME};

/// Registry tuning parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Name used to tag log output (default: "beacon")
    #[serde(default = "default_name")]
    pub name: String,

    /// Pending mutation count above which a warning is logged (default: 10000)
    #[serde(default = "default_queue_warn_threshold")]
    pub queue_warn_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            queue_warn_threshold: default_queue_warn_threshold(),
        }
    }
}

fn default_name() -> String {
    DEFAULT_REGISTRY_NAME.to_string()
}

fn default_queue_warn_threshold() -> usize {
    DEFAULT_QUEUE_WARN_THRESHOLD
}
