use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use respin_core::{parse_package_record, serialize_package_record};
use tracing::debug;

use crate::fs_ops::write_file_atomic;
use crate::PackageRegistry;

const RECORD_EXTENSION: &str = "record";

/// Persists a [`PackageRegistry`] as one flat record file per package.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    records_dir: PathBuf,
}

impl RegistryStore {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.records_dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    pub fn load(&self) -> Result<PackageRegistry> {
        let mut registry = PackageRegistry::new();
        if !self.records_dir.exists() {
            return Ok(registry);
        }

        for path in self.record_paths()? {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read package record: {}", path.display()))?;
            let package = parse_package_record(&raw)
                .with_context(|| format!("failed to parse package record: {}", path.display()))?;
            let expected = self.record_path(&package.name);
            if expected != path {
                anyhow::bail!(
                    "package record {} declares name '{}' (expected file {})",
                    path.display(),
                    package.name,
                    expected.display()
                );
            }
            registry.register(package);
        }

        debug!(count = registry.len(), dir = %self.records_dir.display(), "loaded registry");
        Ok(registry)
    }

    /// Writes every registered package and removes records for packages
    /// that are no longer registered.
    pub fn save(&self, registry: &PackageRegistry) -> Result<()> {
        fs::create_dir_all(&self.records_dir).with_context(|| {
            format!(
                "failed to create package record dir: {}",
                self.records_dir.display()
            )
        })?;

        // Serialize everything up front so an invalid package writes nothing.
        let mut staged = Vec::with_capacity(registry.len());
        for package in registry.packages() {
            let payload = serialize_package_record(package)
                .with_context(|| format!("refusing to save package '{}'", package.name))?;
            staged.push((self.record_path(&package.name), payload));
        }

        let mut kept = HashSet::new();
        for (path, payload) in staged {
            write_file_atomic(&path, payload.as_bytes())
                .with_context(|| format!("failed to write package record: {}", path.display()))?;
            kept.insert(path);
        }

        for path in self.record_paths()? {
            if kept.contains(&path) {
                continue;
            }
            fs::remove_file(&path).with_context(|| {
                format!("failed to remove stale package record: {}", path.display())
            })?;
        }

        debug!(count = registry.len(), dir = %self.records_dir.display(), "saved registry");
        Ok(())
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.records_dir).with_context(|| {
            format!(
                "failed to read package record dir: {}",
                self.records_dir.display()
            )
        })? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            paths.push(path);
        }
        paths.sort();
        Ok(paths)
    }
}
