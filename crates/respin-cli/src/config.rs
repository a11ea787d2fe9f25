use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::PrefixLayout;

pub(crate) const DEFAULT_ROOT: &str = "default";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RespinConfig {
    #[serde(default)]
    pub(crate) rebuild: RebuildConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct RebuildConfig {
    pub(crate) command: Option<String>,
    #[serde(default)]
    pub(crate) default_excluded: Vec<String>,
    #[serde(default = "default_root")]
    pub(crate) default_root: String,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            command: None,
            default_excluded: Vec::new(),
            default_root: default_root(),
        }
    }
}

fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}

impl RespinConfig {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse respin config")
    }

    pub(crate) fn root_or_default(&self, root: Option<String>) -> String {
        root.unwrap_or_else(|| self.rebuild.default_root.clone())
    }
}

/// Loads `explicit` when given (it must exist), otherwise the prefix config
/// file if present, otherwise defaults.
pub(crate) fn load_config(explicit: Option<&Path>, layout: &PrefixLayout) -> Result<RespinConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = layout.config_path();
            if !path.exists() {
                return Ok(RespinConfig::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    RespinConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config: {}", path.display()))
}
