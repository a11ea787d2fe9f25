use anyhow::{Context, Result};
use respin_core::{validate_package_name, ExclusionSet};
use respin_registry::write_file_atomic;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::PrefixLayout;

pub fn validate_root_name(root: &str) -> Result<()> {
    if root.trim().is_empty() {
        anyhow::bail!("build root name must not be empty");
    }
    if root.starts_with('.')
        || root
            .chars()
            .any(|ch| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.'))
    {
        anyhow::bail!(
            "build root name must use ASCII letters, digits, '-', '_' or '.' and not start with '.': {root}"
        );
    }
    Ok(())
}

/// Persists the dirty marker for `root`. The file's presence is the marker;
/// its lines record the exclusion set.
pub fn write_dirty_marker(
    layout: &PrefixLayout,
    root: &str,
    excluded: &ExclusionSet,
) -> Result<PathBuf> {
    validate_root_name(root)?;
    let mut payload = String::new();
    for name in excluded.iter() {
        validate_package_name(name)
            .with_context(|| format!("invalid excluded package for build root '{root}'"))?;
        payload.push_str(&format!("exclude={name}\n"));
    }

    let marker_path = layout.dirty_marker_path(root);
    write_file_atomic(&marker_path, payload.as_bytes())
        .with_context(|| format!("failed to write dirty marker: {}", marker_path.display()))?;
    Ok(marker_path)
}

pub fn read_dirty_marker(layout: &PrefixLayout, root: &str) -> Result<Option<ExclusionSet>> {
    validate_root_name(root)?;
    let marker_path = layout.dirty_marker_path(root);
    if !marker_path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(&marker_path)
        .with_context(|| format!("failed to read dirty marker: {}", marker_path.display()))?;
    Ok(Some(parse_marker(&raw)))
}

pub fn read_dirty_markers(layout: &PrefixLayout) -> Result<BTreeMap<String, ExclusionSet>> {
    let dir = layout.roots_state_dir();
    if !dir.exists() {
        return Ok(BTreeMap::new());
    }

    let mut markers = BTreeMap::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read marker state directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("dirty") {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|v| v.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read dirty marker: {}", path.display()))?;
        markers.insert(stem.to_string(), parse_marker(&raw));
    }

    Ok(markers)
}

pub fn clear_dirty_marker(layout: &PrefixLayout, root: &str) -> Result<bool> {
    validate_root_name(root)?;
    let marker_path = layout.dirty_marker_path(root);
    if !marker_path.exists() {
        return Ok(false);
    }

    fs::remove_file(&marker_path)
        .with_context(|| format!("failed to remove dirty marker: {}", marker_path.display()))?;
    Ok(true)
}

fn parse_marker(raw: &str) -> ExclusionSet {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("exclude="))
        .filter(|name| !name.is_empty())
        .collect()
}
