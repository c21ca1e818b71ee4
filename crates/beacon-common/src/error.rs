//! Error types for Beacon
//!
//! This module defines:
//! - `BeaconError`: Application-specific error enum
//! - `Result`: Crate-wide result alias

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum BeaconError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("registry has been shut down")]
    RegistryShutdown,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("bootstrap error: {0}")]
    BootstrapError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl BeaconError {
    /// True when the error only reports that the registry is no longer accepting work
    pub fn is_shutdown(&self) -> bool {
        matches!(self, BeaconError::RegistryShutdown)
    }
}

impl From<anyhow::Error> for BeaconError {
    fn from(value: anyhow::Error) -> Self {
        BeaconError::InternalError(value.to_string())
    }
}

pub type Result<T, E = BeaconError> = std::result::Result<T, E>;
