//! Bootstrap loader
//!
//! Reads a list of instance records from a YAML or JSON file and registers
//! them with a `Bootstrap` source named after the file, so any local or
//! replicated copy written later takes precedence.

use std::path::Path;

use tracing::{info, warn};

use beacon_common::{BeaconError, Result};
use beacon_registry::{InstanceInfo, Source, SourcedRegistry};

fn parse_records(path: &Path, content: &str) -> Result<Vec<InstanceInfo>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("yml") | Some("yaml") => serde_yaml::from_str(content)
            .map_err(|e| BeaconError::BootstrapError(format!("{}: {}", path.display(), e))),
        Some("json") => serde_json::from_str(content)
            .map_err(|e| BeaconError::BootstrapError(format!("{}: {}", path.display(), e))),
        _ => Err(BeaconError::BootstrapError(format!(
            "unsupported bootstrap file format: {}",
            path.display()
        ))),
    }
}

/// Register every record in `path` and wait until all are applied
///
/// Returns the number of records loaded. Records without an id are skipped.
pub async fn load_bootstrap_file(registry: &SourcedRegistry, path: &Path) -> Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BeaconError::BootstrapError(format!("{}: {}", path.display(), e)))?;
    let records = parse_records(path, &content)?;

    let writer = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("bootstrap");
    let source = Source::bootstrap(writer);

    let mut acks = Vec::with_capacity(records.len());
    for record in records {
        if record.id.is_empty() {
            warn!("Skipping bootstrap record without id (app: {})", record.app);
            continue;
        }
        acks.push(registry.register(record, source.clone()));
    }

    let mut loaded = 0;
    for ack in acks {
        if ack.await? {
            loaded += 1;
        }
    }

    info!("Loaded {} bootstrap records from {}", loaded, path.display());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use beacon_registry::{InstanceStatus, Interest, Origin};

    use super::*;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("seed")
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let file = write_file(
            ".yml",
            r#"
- id: d-1
  app: discovery
  status: UP
- id: z-1
  app: zuul
  status: STARTING
  vipAddress: zuul:80
"#,
        );
        let registry = SourcedRegistry::default();

        let loaded = load_bootstrap_file(&registry, file.path()).await.unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(registry.size(), 2);

        let zuul = registry.get("z-1").unwrap();
        assert_eq!(zuul.status, InstanceStatus::Starting);
        assert_eq!(zuul.vip_address.as_deref(), Some("zuul:80"));
    }

    #[tokio::test]
    async fn test_load_json_skips_records_without_id() {
        let file = write_file(
            ".json",
            r#"[{"id":"d-1","app":"discovery"},{"app":"orphan"}]"#,
        );
        let registry = SourcedRegistry::default();

        let loaded = load_bootstrap_file(&registry, file.path()).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(registry.for_snapshot(&Interest::FullRegistry).len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_copy_yields_to_local() {
        let file = write_file(".yml", "- id: d-1\n  app: discovery\n  status: DOWN\n");
        let registry = SourcedRegistry::default();
        load_bootstrap_file(&registry, file.path()).await.unwrap();

        let local = InstanceInfo::builder("d-1", "discovery")
            .with_status(InstanceStatus::Up)
            .build();
        registry.register(local.clone(), Source::local()).await.unwrap();

        assert_eq!(registry.get("d-1"), Some(local));
        assert_eq!(registry.copy_count("d-1"), 2);

        let mut bootstrap_only =
            registry.for_interest(Interest::FullRegistry, Source::matcher_for(Origin::Bootstrap));
        registry.register(
            InstanceInfo::builder("d-2", "discovery").build(),
            Source::local(),
        )
        .await
        .unwrap();
        // d-1's active copy is local, so nothing replays for the bootstrap matcher
        assert!(bootstrap_only.try_next().is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let registry = SourcedRegistry::default();
        let err = load_bootstrap_file(&registry, Path::new("/nonexistent/seed.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, BeaconError::BootstrapError(_)));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let file = write_file(".txt", "d-1");
        let registry = SourcedRegistry::default();
        let err = load_bootstrap_file(&registry, file.path()).await.unwrap_err();
        assert!(matches!(err, BeaconError::BootstrapError(_)));
    }
}
