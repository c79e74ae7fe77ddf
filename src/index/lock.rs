// Single-writer guard for the first index build

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lock file held while an index is being built, removed on drop
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

/// Result of waiting on another process's build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The index directory appeared
    IndexReady,
    /// The lock was released without an index appearing
    LockReleased,
    /// The lock outlived the timeout and was removed as stale
    StaleLockRemoved,
}

/// `<index>.lock`, next to the index directory
#[inline]
pub fn lock_path(index_path: &Path) -> PathBuf {
    let mut name = index_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    index_path.with_file_name(name)
}

impl BuildLock {
    /// Take the lock, or return `None` when another process holds it
    #[inline]
    pub fn try_acquire(index_path: &Path) -> Result<Option<Self>> {
        let path = lock_path(index_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{} {}", std::process::id(), Utc::now().to_rfc3339())
                    .context("Failed to write index build lock file")?;
                debug!("Acquired build lock {}", path.display());
                Ok(Some(Self { path }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e).context("Failed to create index build lock file"),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove build lock {}: {}", self.path.display(), e);
        }
    }
}

/// Wait for another process's build to finish
///
/// Returns once the index exists, the lock disappears, or `timeout` passes. A lock
/// still present after the timeout is deleted so the caller can retry.
#[inline]
pub async fn wait_for_build(index_path: &Path, timeout: Duration) -> Result<WaitOutcome> {
    let lock = lock_path(index_path);
    let started = Instant::now();

    debug!(
        "Waiting up to {:?} for build lock {}",
        timeout,
        lock.display()
    );

    loop {
        if index_path.exists() {
            return Ok(WaitOutcome::IndexReady);
        }
        if !lock.exists() {
            return Ok(WaitOutcome::LockReleased);
        }
        if started.elapsed() >= timeout {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }

    warn!(
        "Build lock {} held for more than {:?}, treating it as stale",
        lock.display(),
        timeout
    );
    match fs::remove_file(&lock) {
        Ok(()) => Ok(WaitOutcome::StaleLockRemoved),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(WaitOutcome::LockReleased),
        Err(e) => Err(e).context("Failed to remove stale build lock"),
    }
}
