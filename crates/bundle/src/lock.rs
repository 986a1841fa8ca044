//! Merge serialization
//!
//! Merges into one `(dataset, frequency)` bundle are serialized twice: a
//! process-local mutex per lock path, then an exclusive `fs2` lock on the
//! lock file so separate processes cannot interleave either.

use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;

/// Exclusive file lock, released on drop
#[derive(Debug)]
pub struct BundleLock {
    file: File,
    path: PathBuf,
}

impl BundleLock {
    /// Block until the lock at `path` is held
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = Self::open(path)?;
        file.lock_exclusive()?;
        Self::stamp(&mut file)?;
        tracing::debug!(path = %path.display(), "Bundle lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let mut file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                Self::stamp(&mut file)?;
                Ok(Some(Self {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Not truncated on open: the holder's pid stays readable until the
        // next holder has the lock.
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    fn stamp(file: &mut File) -> Result<()> {
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for BundleLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release bundle lock");
        }
    }
}

/// Process-local mutexes keyed by lock path
///
/// Entries are never evicted; the table grows by one per bundle touched.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub(crate) fn entry(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }
}

/// Both locks for one bundle, held for the duration of a merge
pub(crate) struct MergeGuard<'a> {
    // Field order matters: the file lock is released before the mutex.
    _file: BundleLock,
    _local: MutexGuard<'a, ()>,
}

impl<'a> MergeGuard<'a> {
    pub(crate) fn acquire(local: &'a Mutex<()>, path: &Path) -> Result<Self> {
        let local = local.lock();
        let file = BundleLock::acquire(path)?;
        Ok(Self {
            _file: file,
            _local: local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds").join(".daily.lock");

        let held = BundleLock::acquire(&path).unwrap();
        assert!(BundleLock::try_acquire(&path).unwrap().is_none());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        drop(held);
        assert!(BundleLock::try_acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_lock_table_shares_mutex_per_path() {
        let table = LockTable::default();
        let a = table.entry(Path::new("/x/.daily.lock"));
        let b = table.entry(Path::new("/x/.daily.lock"));
        let c = table.entry(Path::new("/x/.hourly.lock"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
