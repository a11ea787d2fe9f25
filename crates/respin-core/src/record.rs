use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::package::{validate_package_name, Package, PackageStatus};

/// Rejects values that cannot be stored on a single `key=value` line.
pub fn validate_record_value(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{field} must not be empty");
    }
    if value.contains(['\n', '\r']) {
        anyhow::bail!("{field} must not contain line breaks: {value:?}");
    }
    Ok(())
}

pub fn serialize_package_record(package: &Package) -> Result<String> {
    validate_package_name(&package.name)?;
    validate_record_value("version", &package.version)?;

    let mut payload = String::new();
    payload.push_str(&format!("name={}\n", package.name));
    payload.push_str(&format!("version={}\n", package.version));
    payload.push_str(&format!("status={}\n", package.status.as_str()));
    for dependency in &package.dependencies {
        validate_package_name(dependency)
            .with_context(|| format!("invalid dependency of '{}'", package.name))?;
        payload.push_str(&format!("dependency={}\n", dependency));
    }
    for file in &package.files {
        validate_record_value("file", file)?;
        payload.push_str(&format!("file={}\n", file));
    }
    payload.push_str(&format!(
        "installed_at_unix={}\n",
        package.installed_at_unix
    ));
    Ok(payload)
}

pub fn parse_package_record(raw: &str) -> Result<Package> {
    let mut name = None;
    let mut version = None;
    let mut status = None;
    let mut dependencies = BTreeSet::new();
    let mut files = BTreeSet::new();
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        match k {
            "name" => name = Some(v.to_string()),
            "version" => version = Some(v.to_string()),
            "status" => status = Some(PackageStatus::parse(v)?),
            "dependency" => {
                validate_package_name(v).context("invalid dependency name")?;
                dependencies.insert(v.to_string());
            }
            "file" => {
                files.insert(v.to_string());
            }
            "installed_at_unix" => {
                installed_at_unix = Some(v.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    let name: String = name.context("missing name")?;
    validate_package_name(&name)?;
    if dependencies.contains(&name) {
        anyhow::bail!("package '{name}' depends on itself");
    }

    Ok(Package {
        name,
        version: version.context("missing version")?,
        files,
        dependencies,
        status: status.unwrap_or(PackageStatus::Installed),
        installed_at_unix: installed_at_unix.context("missing installed_at_unix")?,
    })
}
