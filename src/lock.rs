//! File-based locking for snapshot files.
//!
//! Cross-platform (fs2) advisory locks on a sidecar "<snapshot>.lock":
//! - Exclusive: writer (save_snapshot), one at a time.
//! - Shared: readers (load_snapshot), не мешают друг другу.
//!
//! Снапшот заменяется через rename, поэтому лочится не он сам, а sidecar.
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

/// "<snapshot>.lock" рядом со снапшотом.
pub fn lock_file_path(snapshot: &Path) -> PathBuf {
    let mut s: OsString = snapshot.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

/// Acquire a lock in the requested mode. Blocks until acquired.
pub fn acquire_lock(snapshot: &Path, mode: LockMode) -> Result<LockGuard> {
    let path = lock_file_path(snapshot);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    match mode {
        LockMode::Shared => file
            .lock_shared()
            .with_context(|| format!("lock_shared {}", path.display()))?,
        LockMode::Exclusive => file
            .lock_exclusive()
            .with_context(|| format!("lock_exclusive {}", path.display()))?,
    }
    Ok(LockGuard { file, path, mode })
}
