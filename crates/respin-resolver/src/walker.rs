use std::collections::{BTreeMap, BTreeSet};

use respin_core::{CoordinatorError, ExclusionSet};
use respin_registry::PackageRegistry;
use tracing::debug;

use crate::order::topo_order;
use crate::{InvalidationContext, RebuildPlan};

/// Computes the packages `root` must rebuild, dependencies first.
///
/// A clean root yields an empty plan. Otherwise every package that is not
/// `Installed` is stale, along with every transitive consumer of a stale
/// package. Excluded packages never enter the plan and count as satisfied,
/// so staleness does not flow through them. The whole dependency graph is
/// validated before any ordering is produced.
pub fn compute_rebuild_set(
    registry: &PackageRegistry,
    ctx: &InvalidationContext,
    root: &str,
) -> Result<RebuildPlan, CoordinatorError> {
    let Some(excluded) = ctx.exclusions(root) else {
        debug!(root, "build root is clean; nothing to rebuild");
        return Ok(RebuildPlan::clean(root));
    };

    let graph = dependency_graph(registry, excluded)?;
    let full_order = topo_order(&graph)?;

    let mut stale: BTreeSet<&str> = BTreeSet::new();
    for name in &full_order {
        if excluded.contains(name) {
            continue;
        }
        let package = registry.lookup(name)?;
        let stale_dependency = package
            .dependencies
            .iter()
            .find(|dep| stale.contains(dep.as_str()));
        if !package.is_installed() {
            debug!(name = %name, status = %package.status, "package is stale");
            stale.insert(name.as_str());
        } else if let Some(dep) = stale_dependency {
            debug!(name = %name, dependency = %dep, "package is stale through dependency");
            stale.insert(name.as_str());
        }
    }

    let stale_graph: BTreeMap<String, BTreeSet<String>> = graph
        .into_iter()
        .filter(|(name, _)| stale.contains(name.as_str()))
        .collect();
    let packages = topo_order(&stale_graph)?
        .iter()
        .map(|name| registry.lookup(name).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    debug!(root, count = packages.len(), "computed rebuild set");
    Ok(RebuildPlan {
        root: root.to_string(),
        excluded: excluded.clone(),
        packages,
    })
}

/// Package → dependencies for the whole registry. A dependency on an
/// unregistered package is an error unless that package is excluded.
fn dependency_graph(
    registry: &PackageRegistry,
    excluded: &ExclusionSet,
) -> Result<BTreeMap<String, BTreeSet<String>>, CoordinatorError> {
    let mut graph = BTreeMap::new();
    for package in registry.packages() {
        for dep in &package.dependencies {
            if !registry.contains(dep) && !excluded.contains(dep) {
                return Err(CoordinatorError::not_found(dep.as_str()));
            }
        }
        graph.insert(package.name.clone(), package.dependencies.clone());
    }
    Ok(graph)
}
