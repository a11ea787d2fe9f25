use std::collections::HashSet;

use respin_core::{current_unix_timestamp, CoordinatorError, Package, PackageStatus};
use respin_registry::PackageRegistry;
use tracing::{info, warn};

use crate::{
    compute_rebuild_set, InvalidationContext, OutcomeState, PackageOutcome, RebuildReport,
};

/// Rebuilds every package planned for `root`, in order, through `build`.
///
/// A package whose dependency failed or was blocked is not handed to
/// `build`. Successfully built packages return to `Installed`; a planned
/// package left unbuilt is demoted to `SoftUninstalled` so the next pass
/// still sees it as stale. The dirty marker is cleared only when every
/// planned package built.
pub fn run_rebuild_pass_with_builder<F>(
    registry: &mut PackageRegistry,
    ctx: &mut InvalidationContext,
    root: &str,
    mut build: F,
) -> Result<RebuildReport, CoordinatorError>
where
    F: FnMut(&Package) -> anyhow::Result<()>,
{
    let was_dirty = ctx.is_dirty(root);
    let plan = compute_rebuild_set(registry, ctx, root)?;
    if !was_dirty {
        return Ok(RebuildReport {
            root: root.to_string(),
            was_dirty,
            outcomes: Vec::new(),
            marker_cleared: false,
        });
    }

    // Failed or blocked packages; their consumers are not attempted.
    let mut unbuilt: HashSet<String> = HashSet::new();
    let mut outcomes = Vec::with_capacity(plan.packages.len());

    for package in &plan.packages {
        let blocking = package
            .dependencies
            .iter()
            .find(|dep| unbuilt.contains(dep.as_str()))
            .cloned();
        let state = match blocking {
            Some(dep) => {
                demote_unbuilt(registry, package)?;
                unbuilt.insert(package.name.clone());
                warn!(name = %package.name, dependency = %dep, "skipping package with unbuilt dependency");
                OutcomeState::Blocked { by: dep }
            }
            None => match build(package) {
                Ok(()) => {
                    registry.mark_installed(&package.name, current_unix_timestamp()?)?;
                    info!(name = %package.name, version = %package.version, "rebuilt package");
                    OutcomeState::Built
                }
                Err(err) => {
                    demote_unbuilt(registry, package)?;
                    unbuilt.insert(package.name.clone());
                    warn!(name = %package.name, error = %format!("{err:#}"), "package build failed");
                    OutcomeState::Failed {
                        reason: format!("{err:#}"),
                    }
                }
            },
        };
        outcomes.push(PackageOutcome {
            name: package.name.clone(),
            version: package.version.clone(),
            state,
        });
    }

    let marker_cleared = unbuilt.is_empty() && ctx.clear(root);
    Ok(RebuildReport {
        root: root.to_string(),
        was_dirty,
        outcomes,
        marker_cleared,
    })
}

fn demote_unbuilt(registry: &mut PackageRegistry, package: &Package) -> Result<(), CoordinatorError> {
    if package.is_installed() {
        registry.set_status(&package.name, PackageStatus::SoftUninstalled)?;
    }
    Ok(())
}
