use std::fs;
use std::io::{self, Write};
use std::path::Path;
#[cfg(not(target_os = "linux"))]
use std::process::Command;
#[cfg(all(unix, not(target_os = "linux")))]
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

/// Runs `run` while holding the registry lock at `lock_path`.
///
/// The lock is a file created with create-new semantics that holds the
/// claimant's pid. It is removed once `run` returns, whether or not `run`
/// succeeded.
pub fn with_registry_lock<T, F>(lock_path: &Path, run: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    claim_lock(lock_path)?;
    debug!(path = %lock_path.display(), "claimed registry lock");

    let result = run();
    let released = release_lock(lock_path);
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), _) => Err(err),
    }
}

pub fn read_lock_holder(lock_path: &Path) -> Result<Option<String>> {
    let raw = match fs::read_to_string(lock_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read registry lock: {}", lock_path.display())
            });
        }
    };

    let holder = raw.trim();
    if holder.is_empty() {
        return Ok(None);
    }
    Ok(Some(holder.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockRepair {
    NotHeld,
    /// The lock named a process that is no longer running, or held no
    /// readable pid, and was removed.
    ClearedStale { holder: Option<String> },
    HeldByLiveProcess { pid: u32 },
}

/// Removes the registry lock when its holder is gone. A lock held by a
/// running process is left alone.
pub fn repair_registry_lock(lock_path: &Path) -> Result<LockRepair> {
    if !lock_path.exists() {
        return Ok(LockRepair::NotHeld);
    }

    let holder = read_lock_holder(lock_path)?;
    if let Some(pid) = holder.as_deref().and_then(|raw| raw.parse::<u32>().ok()) {
        if process_is_alive(pid) {
            debug!(pid, path = %lock_path.display(), "registry lock holder is running");
            return Ok(LockRepair::HeldByLiveProcess { pid });
        }
    }

    release_lock(lock_path)?;
    warn!(
        holder = holder.as_deref().unwrap_or("unknown"),
        path = %lock_path.display(),
        "cleared stale registry lock"
    );
    Ok(LockRepair::ClearedStale { holder })
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    pid == std::process::id() || Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_is_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    // An unknown answer keeps the lock.
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

#[cfg(windows)]
fn process_is_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    match Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
    {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .any(|field| field == pid.to_string()),
        Err(_) => true,
    }
}

fn claim_lock(lock_path: &Path) -> Result<()> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let existing = read_lock_holder(lock_path).ok().flatten();
            let detail = existing
                .map(|pid| format!(" (pid={pid})"))
                .unwrap_or_default();
            return Err(anyhow!(
                "registry lock already held{detail}: {} (run `respin repair` if that process is gone)",
                lock_path.display()
            ));
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to claim registry lock: {}", lock_path.display())
            });
        }
    };

    file.write_all(format!("{}\n", std::process::id()).as_bytes())
        .with_context(|| format!("failed to write registry lock: {}", lock_path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush registry lock: {}", lock_path.display()))?;
    Ok(())
}

fn release_lock(lock_path: &Path) -> Result<()> {
    match fs::remove_file(lock_path) {
        Ok(()) => {
            debug!(path = %lock_path.display(), "released registry lock");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to release registry lock: {}", lock_path.display())),
    }
}
