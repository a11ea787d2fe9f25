use std::process::Command;

use respin_core::{validate_package_name, validate_record_value};
use respin_installer::SoftUninstallResult;
use serde_json::json;

use super::*;

/// Registry and dirty markers loaded from a prefix.
#[derive(Debug, Clone)]
pub(crate) struct CoordinatorState {
    pub(crate) registry: PackageRegistry,
    pub(crate) invalidation: InvalidationContext,
}

pub(crate) fn load_state(layout: &PrefixLayout) -> Result<CoordinatorState> {
    let registry = layout.registry_store().load()?;
    let invalidation = InvalidationContext::from_markers(read_dirty_markers(layout)?);
    Ok(CoordinatorState {
        registry,
        invalidation,
    })
}

/// Writes dirty markers, then package records, then removes markers for
/// roots that became clean. A failure part way leaves roots dirty rather
/// than clean, so the next rebuild recomputes them.
pub(crate) fn save_state(layout: &PrefixLayout, state: &CoordinatorState) -> Result<()> {
    for (root, excluded) in state.invalidation.markers() {
        write_dirty_marker(layout, root, excluded)?;
    }

    layout.registry_store().save(&state.registry)?;

    for root in read_dirty_markers(layout)?.keys() {
        if !state.invalidation.is_dirty(root) {
            clear_dirty_marker(layout, root)?;
        }
    }
    Ok(())
}

/// Loads state under the registry lock, runs `mutate`, and saves the state
/// back only when `mutate` succeeded.
pub(crate) fn with_locked_state<T, F>(layout: &PrefixLayout, mutate: F) -> Result<T>
where
    F: FnOnce(&mut CoordinatorState) -> Result<T>,
{
    layout.ensure_base_dirs()?;
    with_registry_lock(&layout.registry_lock_path(), || {
        let mut state = load_state(layout)?;
        let value = mutate(&mut state)?;
        save_state(layout, &state)?;
        Ok(value)
    })
}

pub(crate) fn run_register_command(
    layout: &PrefixLayout,
    name: &str,
    version: &str,
    dependencies: &[String],
    files: &[String],
) -> Result<Package> {
    validate_package_name(name)?;
    validate_record_value("package version", version)?;
    for dep in dependencies {
        validate_package_name(dep).with_context(|| format!("invalid dependency of '{name}'"))?;
        if dep == name {
            anyhow::bail!("package '{name}' cannot depend on itself");
        }
    }
    for file in files {
        validate_record_value("package file", file)?;
    }

    let mut package = Package::new(name, version);
    package.dependencies = dependencies.iter().cloned().collect();
    package.files = files.iter().cloned().collect();
    package.installed_at_unix = current_unix_timestamp()?;

    with_locked_state(layout, |state| {
        state.registry.register(package.clone());
        Ok(package)
    })
}

pub(crate) fn run_soft_uninstall_command(
    layout: &PrefixLayout,
    names: &[String],
) -> Result<Vec<SoftUninstallResult>> {
    with_locked_state(layout, |state| {
        names
            .iter()
            .map(|name| soft_uninstall(&mut state.registry, name).map_err(anyhow::Error::from))
            .collect()
    })
}

pub(crate) fn run_invalidate_command(
    layout: &PrefixLayout,
    config: &RespinConfig,
    root: &str,
    excluded: &[String],
    touch: &[PathBuf],
) -> Result<ExclusionSet> {
    validate_root_name(root)?;
    let mut requested: ExclusionSet = config.rebuild.default_excluded.iter().cloned().collect();
    for name in excluded {
        requested.insert(name.clone());
    }
    for name in requested.iter() {
        validate_package_name(name).context("invalid excluded package")?;
    }

    let recorded = with_locked_state(layout, |state| {
        invalidate(&mut state.invalidation, root, &requested);
        Ok(state
            .invalidation
            .exclusions(root)
            .cloned()
            .unwrap_or_default())
    })?;

    for path in touch {
        touch_stamp(path)
            .with_context(|| format!("failed to touch stamp file: {}", path.display()))?;
    }
    Ok(recorded)
}

pub(crate) fn run_plan_command(layout: &PrefixLayout, root: &str) -> Result<RebuildPlan> {
    validate_root_name(root)?;
    let state = load_state(layout)?;
    Ok(compute_rebuild_set(
        &state.registry,
        &state.invalidation,
        root,
    )?)
}

pub(crate) fn run_rebuild_command<F>(
    layout: &PrefixLayout,
    root: &str,
    template: &str,
    mut on_package: F,
) -> Result<RebuildReport>
where
    F: FnMut(&Package),
{
    validate_root_name(root)?;
    with_locked_state(layout, |state| {
        let report = run_rebuild_pass_with_builder(
            &mut state.registry,
            &mut state.invalidation,
            root,
            |package| {
                on_package(package);
                build_package_with_command(layout, template, package)
            },
        )?;
        Ok(report)
    })
}

pub(crate) fn run_repair_command(layout: &PrefixLayout) -> Result<LockRepair> {
    let lock_path = layout.registry_lock_path();
    match repair_registry_lock(&lock_path)? {
        LockRepair::HeldByLiveProcess { pid } => Err(anyhow!(
            "registry lock is held by running process {pid}: {}; wait for it to finish",
            lock_path.display()
        )),
        repair => Ok(repair),
    }
}

pub(crate) fn format_repair_lines(repair: &LockRepair, style: OutputStyle) -> Vec<String> {
    let line = match repair {
        LockRepair::NotHeld => render_status_line(style, "skip", "repair: no action needed"),
        LockRepair::ClearedStale { holder } => render_status_line(
            style,
            "ok",
            &format!(
                "repair: cleared stale registry lock (pid={})",
                holder.as_deref().unwrap_or("unknown")
            ),
        ),
        LockRepair::HeldByLiveProcess { pid } => render_status_line(
            style,
            "warn",
            &format!("repair: registry lock is held by running process {pid}"),
        ),
    };
    vec![line]
}

pub(crate) fn planned_package_count(layout: &PrefixLayout, root: &str) -> Result<usize> {
    Ok(run_plan_command(layout, root)?.packages.len())
}

pub(crate) fn render_command_template(template: &str, package: &Package, prefix: &Path) -> String {
    template
        .replace("{name}", &package.name)
        .replace("{version}", &package.version)
        .replace("{prefix}", &prefix.display().to_string())
}

pub(crate) fn build_package_with_command(
    layout: &PrefixLayout,
    template: &str,
    package: &Package,
) -> Result<()> {
    let rendered = render_command_template(template, package, layout.prefix());
    let mut command = shell_command(&rendered);
    command
        .current_dir(layout.prefix())
        .env("RESPIN_PACKAGE", &package.name)
        .env("RESPIN_VERSION", &package.version)
        .env("RESPIN_PREFIX", layout.prefix());
    run_command(
        &mut command,
        &format!("build of {} {} failed", package.name, package.version),
    )
}

fn shell_command(rendered: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(rendered);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(rendered);
        command
    }
}

fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

pub(crate) fn format_list_lines(registry: &PackageRegistry) -> Vec<String> {
    if registry.is_empty() {
        return vec!["No packages registered".to_string()];
    }
    registry
        .packages()
        .map(|package| format!("{} {} ({})", package.name, package.version, package.status))
        .collect()
}

pub(crate) fn format_show_lines(
    layout: &PrefixLayout,
    registry: &PackageRegistry,
    name: &str,
) -> Result<Vec<String>> {
    let package = registry.lookup(name)?;
    let missing = missing_files(layout, package);

    let mut lines = vec![
        format!("Package: {}", package.name),
        format!("Version: {}", package.version),
        format!("Status: {}", package.status),
    ];
    lines.push(format!(
        "Dependencies: {}",
        join_or_none(package.dependencies.iter().map(String::as_str))
    ));
    lines.push(format!(
        "Dependents: {}",
        join_or_none(registry.dependents_of(name).into_iter())
    ));
    lines.push(format!("Files: {}", package.files.len()));
    for owned in &package.files {
        let marker = if missing.contains(&layout.resolve_owned_path(owned)) {
            " (missing)"
        } else {
            ""
        };
        lines.push(format!("- {owned}{marker}"));
    }
    Ok(lines)
}

pub(crate) fn format_soft_uninstall_lines(
    results: &[SoftUninstallResult],
    style: OutputStyle,
) -> Vec<String> {
    results
        .iter()
        .map(|result| match result.status {
            SoftUninstallStatus::SoftUninstalled => render_status_line(
                style,
                "ok",
                &format!(
                    "soft-uninstalled {} {} (files kept)",
                    result.name, result.version
                ),
            ),
            SoftUninstallStatus::AlreadySoftUninstalled => render_status_line(
                style,
                "skip",
                &format!("{} {} already soft-uninstalled", result.name, result.version),
            ),
        })
        .collect()
}

pub(crate) fn format_invalidate_lines(
    root: &str,
    excluded: &ExclusionSet,
    style: OutputStyle,
) -> Vec<String> {
    vec![render_status_line(
        style,
        "ok",
        &format!(
            "marked build root '{root}' dirty (excluded: {})",
            join_or_none(excluded.iter())
        ),
    )]
}

pub(crate) fn format_plan_lines(plan: &RebuildPlan, was_dirty: bool) -> Vec<String> {
    if !was_dirty {
        return vec![format!("build root '{}' is clean", plan.root)];
    }
    if plan.is_empty() {
        return vec![format!(
            "build root '{}' is dirty but nothing needs rebuilding",
            plan.root
        )];
    }
    plan.packages
        .iter()
        .map(|package| format!("{} {}", package.name, package.version))
        .collect()
}

pub(crate) fn plan_json(plan: &RebuildPlan, was_dirty: bool) -> serde_json::Value {
    json!({
        "root": plan.root,
        "dirty": was_dirty,
        "excluded": plan.excluded.iter().collect::<Vec<_>>(),
        "packages": plan
            .packages
            .iter()
            .map(|package| json!({
                "name": package.name,
                "version": package.version,
                "status": package.status,
            }))
            .collect::<Vec<_>>(),
    })
}

pub(crate) fn format_rebuild_report_lines(report: &RebuildReport, style: OutputStyle) -> Vec<String> {
    if !report.was_dirty {
        return vec![render_status_line(
            style,
            "skip",
            &format!("build root '{}' is clean; nothing to rebuild", report.root),
        )];
    }

    let mut lines = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.state {
            OutcomeState::Built => render_status_line(
                style,
                "ok",
                &format!("rebuilt {} {}", outcome.name, outcome.version),
            ),
            OutcomeState::Failed { reason } => render_status_line(
                style,
                "err",
                &format!("failed {} {}: {reason}", outcome.name, outcome.version),
            ),
            OutcomeState::Blocked { by } => render_status_line(
                style,
                "skip",
                &format!(
                    "skipped {} {} (dependency {by} did not build)",
                    outcome.name, outcome.version
                ),
            ),
        })
        .collect::<Vec<_>>();

    lines.push(if report.marker_cleared {
        render_status_line(
            style,
            "ok",
            &format!("build root '{}' is clean", report.root),
        )
    } else {
        render_status_line(
            style,
            "warn",
            &format!(
                "build root '{}' stays dirty; rerun rebuild after fixing failures",
                report.root
            ),
        )
    });
    lines
}

pub(crate) fn format_doctor_lines(layout: &PrefixLayout, state: &CoordinatorState) -> Result<Vec<String>> {
    let mut lines = vec![
        format!("prefix: {}", layout.prefix().display()),
        format!("state: {}", layout.state_dir().display()),
        format!("packages: {}", state.registry.len()),
    ];

    match read_lock_holder(&layout.registry_lock_path())? {
        Some(pid) => lines.push(format!("registry lock: held (pid={pid})")),
        None => lines.push("registry lock: free".to_string()),
    }

    for (root, excluded) in state.invalidation.markers() {
        lines.push(format!(
            "dirty root: {root} (excluded: {})",
            join_or_none(excluded.iter())
        ));
    }

    for package in state.registry.packages() {
        if package.status == PackageStatus::NotInstalled {
            continue;
        }
        let missing = missing_files(layout, package);
        if !missing.is_empty() {
            lines.push(format!(
                "missing files: {} ({} of {})",
                package.name,
                missing.len(),
                package.files.len()
            ));
        }
    }
    Ok(lines)
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}
