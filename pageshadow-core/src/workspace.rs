//! On-disk layout of a pageshadow working directory.
//!
//! ```text
//! <root>/files/file0 ..            source files
//! <root>/logs/logs_<pid>/*.log     per-process write logs
//! <root>/merge/                    merge outputs
//! ```

use crate::error::{Result, ShadowError};
use crate::merge::MergeEngine;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Paths of a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn merge_dir(&self) -> PathBuf {
        self.root.join("merge")
    }

    /// `files/file<index>`.
    pub fn file_path(&self, index: usize) -> PathBuf {
        self.files_dir().join(format!("file{}", index))
    }

    /// Advisory lock taken by serialized workers.
    pub fn worker_lock_path(&self) -> PathBuf {
        self.logs_dir().join(".workers.lock")
    }

    /// Block until this process holds the exclusive worker lock.
    pub fn lock_workers(&self) -> Result<WorkerLock> {
        let path = self.worker_lock_path();
        let logs = self.logs_dir();
        std::fs::create_dir_all(&logs).map_err(|e| ShadowError::io(&logs, e))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| ShadowError::io(&path, e))?;
        file.lock_exclusive()
            .map_err(|e| ShadowError::io(&path, format!("Failed to lock: {}", e)))?;

        tracing::debug!(lock = %path.display(), "Acquired worker lock");
        Ok(WorkerLock { file, path })
    }

    /// A merge engine rooted in this workspace.
    pub fn merge_engine(&self) -> MergeEngine {
        MergeEngine::new(self.merge_dir(), self.logs_dir())
    }

    /// Create `logs/`, `merge/` and `files/`, then (re)write `files` demo
    /// files holding `demo_data`.
    ///
    /// Existing logs and merge outputs are left alone.
    pub fn initialize(&self, files: usize, demo_data: &[u8]) -> Result<Vec<PathBuf>> {
        for dir in [self.logs_dir(), self.merge_dir(), self.files_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| ShadowError::io(&dir, e))?;
        }

        let mut created = Vec::with_capacity(files);
        for index in 0..files {
            let path = self.file_path(index);
            std::fs::write(&path, demo_data).map_err(|e| ShadowError::io(&path, e))?;
            created.push(path);
        }

        tracing::info!(
            root = %self.root.display(),
            files = created.len(),
            "Initialized workspace"
        );
        Ok(created)
    }
}

/// Exclusive advisory lock serializing workers; released on drop.
pub struct WorkerLock {
    file: File,
    path: PathBuf,
}

impl WorkerLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths() {
        let ws = Workspace::new("/w");
        assert_eq!(ws.file_path(3), PathBuf::from("/w/files/file3"));
        assert_eq!(ws.worker_lock_path(), PathBuf::from("/w/logs/.workers.lock"));
        assert_eq!(ws.merge_engine().merge_root(), Path::new("/w/merge"));
        assert_eq!(ws.merge_engine().log_root(), Path::new("/w/logs"));
    }

    #[test]
    fn initialize_seeds_and_truncates() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        std::fs::create_dir_all(ws.files_dir()).unwrap();
        std::fs::write(ws.file_path(0), b"stale content that is longer than the demo").unwrap();

        let created = ws.initialize(2, b"demo").unwrap();
        assert_eq!(created, vec![ws.file_path(0), ws.file_path(1)]);
        assert_eq!(std::fs::read(ws.file_path(0)).unwrap(), b"demo");
        assert_eq!(std::fs::read(ws.file_path(1)).unwrap(), b"demo");
        assert!(ws.logs_dir().is_dir());
        assert!(ws.merge_dir().is_dir());
    }

    #[test]
    fn worker_lock_is_exclusive_until_dropped() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path());

        let lock = ws.lock_workers().unwrap();
        assert_eq!(lock.path(), ws.worker_lock_path());

        let other = File::open(ws.worker_lock_path()).unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(lock);
        other.try_lock_exclusive().unwrap();
        FileExt::unlock(&other).unwrap();
    }
}
