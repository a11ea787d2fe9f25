use std::collections::{BTreeMap, BTreeSet};

use respin_core::{CoordinatorError, Package, PackageStatus};
use tracing::debug;

/// In-memory view of every package the coordinator knows about, keyed by
/// package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRegistry {
    packages: BTreeMap<String, Package>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `package`, replacing any record with the same name. Returns
    /// the replaced record.
    pub fn register(&mut self, package: Package) -> Option<Package> {
        debug!(
            name = %package.name,
            version = %package.version,
            status = %package.status,
            "registering package"
        );
        self.packages.insert(package.name.clone(), package)
    }

    pub fn lookup(&self, id: &str) -> Result<&Package, CoordinatorError> {
        self.packages
            .get(id)
            .ok_or_else(|| CoordinatorError::not_found(id))
    }

    pub fn files_of(&self, id: &str) -> Result<&BTreeSet<String>, CoordinatorError> {
        self.lookup(id).map(|package| &package.files)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Direct consumers of `id`, in name order.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.packages
            .values()
            .filter(|package| package.dependencies.contains(id))
            .map(|package| package.name.as_str())
            .collect()
    }

    pub fn set_status(
        &mut self,
        id: &str,
        status: PackageStatus,
    ) -> Result<PackageStatus, CoordinatorError> {
        let package = self
            .packages
            .get_mut(id)
            .ok_or_else(|| CoordinatorError::not_found(id))?;
        let previous = package.status;
        package.status = status;
        if previous != status {
            debug!(name = %id, from = %previous, to = %status, "package status changed");
        }
        Ok(previous)
    }

    pub fn mark_installed(&mut self, id: &str, installed_at_unix: u64) -> Result<(), CoordinatorError> {
        self.set_status(id, PackageStatus::Installed)?;
        if let Some(package) = self.packages.get_mut(id) {
            package.installed_at_unix = installed_at_unix;
        }
        Ok(())
    }
}

impl FromIterator<Package> for PackageRegistry {
    fn from_iter<I: IntoIterator<Item = Package>>(iter: I) -> Self {
        let mut registry = Self::new();
        for package in iter {
            registry.register(package);
        }
        registry
    }
}
