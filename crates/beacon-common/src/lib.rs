//! Beacon Common - Shared error types and constants
//!
//! This crate provides the foundational types used across all Beacon components:
//! - Error types
//! - Common constants

pub mod error;

// Re-exports for convenience
pub use error::{BeaconError, Result};

/// Writer id used by the local client when none is given
pub const LOCAL_WRITER_ID: &str = "local";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BEACON";

/// Default registry name used in logs
pub const DEFAULT_REGISTRY_NAME: &str = "beacon";

/// Default pending mutation count above which the registry logs a warning
pub const DEFAULT_QUEUE_WARN_THRESHOLD: usize = 10_000;
