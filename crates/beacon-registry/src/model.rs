//! Instance record model
//!
//! The registry treats `InstanceInfo` as an opaque immutable value: it is
//! keyed by `id`, filtered by `app` and the VIP addresses, and compared by
//! value equality. A re-registration always supplies a whole new value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Instance status reported by the owning client
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    #[default]
    Unknown,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Up => write!(f, "UP"),
            InstanceStatus::Down => write!(f, "DOWN"),
            InstanceStatus::Starting => write!(f, "STARTING"),
            InstanceStatus::OutOfService => write!(f, "OUT_OF_SERVICE"),
            InstanceStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Service instance information
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceInfo {
    pub id: String,
    pub app: String,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_vip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub metadata: BTreeMap<String, String>,
}

impl InstanceInfo {
    pub fn builder(id: impl Into<String>, app: impl Into<String>) -> InstanceInfoBuilder {
        InstanceInfoBuilder::new(id, app)
    }

    /// Start a builder seeded with every field of an existing record
    pub fn to_builder(&self) -> InstanceInfoBuilder {
        InstanceInfoBuilder {
            inner: self.clone(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == InstanceStatus::Up
    }
}

/// Builder for `InstanceInfo`
#[derive(Clone, Debug)]
pub struct InstanceInfoBuilder {
    inner: InstanceInfo,
}

impl InstanceInfoBuilder {
    pub fn new(id: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            inner: InstanceInfo {
                id: id.into(),
                app: app.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.inner.status = status;
        self
    }

    pub fn with_vip_address(mut self, vip: impl Into<String>) -> Self {
        self.inner.vip_address = Some(vip.into());
        self
    }

    pub fn with_secure_vip_address(mut self, vip: impl Into<String>) -> Self {
        self.inner.secure_vip_address = Some(vip.into());
        self
    }

    pub fn with_endpoint(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.inner.ip_addr = Some(ip.into());
        self.inner.port = Some(port);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> InstanceInfo {
        self.inner
    }
}
