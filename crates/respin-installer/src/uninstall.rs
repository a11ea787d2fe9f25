use std::path::PathBuf;

use respin_core::{CoordinatorError, Package, PackageStatus};
use respin_registry::PackageRegistry;
use tracing::info;

use crate::{PrefixLayout, SoftUninstallResult, SoftUninstallStatus};

/// Withdraws `name` from the set of packages available to new dependents
/// while leaving every file it owns in place.
///
/// Consumers already linked against the package keep working; the next
/// rebuild pass reinstalls it. Calling this on a package that is already
/// soft-uninstalled is a no-op.
pub fn soft_uninstall(
    registry: &mut PackageRegistry,
    name: &str,
) -> Result<SoftUninstallResult, CoordinatorError> {
    let package = registry.lookup(name)?;
    let version = package.version.clone();
    let current = package.status;

    let status = match current {
        PackageStatus::Installed => {
            registry.set_status(name, PackageStatus::SoftUninstalled)?;
            info!(name, version = %version, "soft-uninstalled package");
            SoftUninstallStatus::SoftUninstalled
        }
        PackageStatus::SoftUninstalled => SoftUninstallStatus::AlreadySoftUninstalled,
        PackageStatus::NotInstalled => {
            return Err(CoordinatorError::NotInstalled {
                id: name.to_string(),
            });
        }
    };

    Ok(SoftUninstallResult {
        name: name.to_string(),
        version,
        status,
    })
}

/// Owned files of `package` that are absent from disk.
pub fn missing_files(layout: &PrefixLayout, package: &Package) -> Vec<PathBuf> {
    package
        .files
        .iter()
        .map(|owned| layout.resolve_owned_path(owned))
        .filter(|path| !path.exists())
        .collect()
}
