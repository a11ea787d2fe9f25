use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::CoordinatorError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Installed,
    SoftUninstalled,
    NotInstalled,
}

impl PackageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::SoftUninstalled => "soft_uninstalled",
            Self::NotInstalled => "not_installed",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "installed" => Ok(Self::Installed),
            "soft_uninstalled" => Ok(Self::SoftUninstalled),
            "not_installed" => Ok(Self::NotInstalled),
            _ => Err(anyhow!("invalid package status: {value}")),
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package known to the registry.
///
/// `files` are the paths the package installed, either absolute or relative
/// to the install prefix. `dependencies` name the providers this package
/// consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub files: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub status: PackageStatus,
    pub installed_at_unix: u64,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            files: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            status: PackageStatus::Installed,
            installed_at_unix: 0,
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.insert(path.into());
        self
    }

    pub fn with_status(mut self, status: PackageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_installed(&self) -> bool {
        self.status == PackageStatus::Installed
    }
}

/// Package names double as record file names, so they are restricted to a
/// path-safe alphabet.
pub fn validate_package_name(name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("package name must not be empty"));
    }
    if name.starts_with('.') {
        return Err(anyhow!("package name must not start with '.': {name}"));
    }
    if name
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '+')))
    {
        return Err(anyhow!(
            "package name contains invalid character(s): {name}"
        ));
    }
    Ok(())
}

/// Seconds since the unix epoch, as stored in `installed_at_unix`.
pub fn current_unix_timestamp() -> Result<u64, CoordinatorError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|_| CoordinatorError::ClockBeforeEpoch)
}
