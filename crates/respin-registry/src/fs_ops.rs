use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

/// Writes `contents` next to `path` and renames it into place so readers
/// never observe a half-written file.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("path has no parent directory: {}", path.display());
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed creating directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = parent.join(format!(".{file_name}.tmp-{}", unique_suffix()));
    fs::write(&staged, contents)
        .with_context(|| format!("failed writing staged file {}", staged.display()))?;
    if let Err(err) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(err)
            .with_context(|| format!("failed moving staged file into {}", path.display()));
    }
    Ok(())
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
