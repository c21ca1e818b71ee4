//! Beacon Registry - Multi-source instance registry
//!
//! This crate provides:
//! - Provenance tags for registration writers
//! - Interest predicates with flatten/compose for the wire form
//! - Per-instance merge of copies written by different sources
//! - A registry with serialized mutation, snapshots and live interest streams

pub mod config;
pub mod holder;
pub mod interest;
pub mod metrics;
pub mod model;
pub mod notification;
pub mod registry;
pub mod source;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use holder::{MultiSourcedHolder, RemoveOutcome};
pub use interest::{Interest, InterestRegistration};
pub use metrics::{NoopRegistryMetrics, RegistryMetrics};
pub use model::{InstanceInfo, InstanceInfoBuilder, InstanceStatus};
pub use notification::{ChangeKind, ChangeNotification, SourcedChangeNotification};
pub use registry::{InterestStream, MutationAck, SourcedRegistry};
pub use source::{Origin, Source, SourceMatcher};
