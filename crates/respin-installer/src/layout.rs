use anyhow::{Context, Result};
use respin_registry::RegistryStore;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLayout {
    prefix: PathBuf,
}
impl PrefixLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn state_dir(&self) -> PathBuf {
        self.prefix.join("state")
    }

    pub fn packages_state_dir(&self) -> PathBuf {
        self.state_dir().join("packages")
    }

    pub fn roots_state_dir(&self) -> PathBuf {
        self.state_dir().join("roots")
    }

    pub fn dirty_marker_path(&self, root: &str) -> PathBuf {
        self.roots_state_dir().join(format!("{root}.dirty"))
    }

    pub fn registry_lock_path(&self) -> PathBuf {
        self.state_dir().join("registry.lock")
    }

    pub fn config_path(&self) -> PathBuf {
        self.prefix.join("respin.toml")
    }

    /// Resolves a package-owned path: absolute paths stay as-is, relative
    /// paths are taken from the prefix.
    pub fn resolve_owned_path(&self, owned: &str) -> PathBuf {
        let path = Path::new(owned);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.prefix.join(path)
        }
    }

    pub fn registry_store(&self) -> RegistryStore {
        RegistryStore::new(self.packages_state_dir())
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.state_dir(),
            self.packages_state_dir(),
            self.roots_state_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_prefix() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user prefix")?;
        return Ok(PathBuf::from(app_data).join("Respin"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user prefix")?;
    Ok(PathBuf::from(home).join(".respin"))
}
