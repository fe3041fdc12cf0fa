//! Repository locks
//!
//! Two layers: `LockTable` hands out one in-process mutex per repository uid,
//! and `FileLock` keeps other processes sharing the same index directory out
//! while an update rewrites a cache directory. On Linux `fs2` locks belong to
//! the open file description, and every `FileLock` opens its own, so the file
//! lock is not what serializes threads of one process.

use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;

pub const LOCK_FILE: &str = ".lock";

/// Exclusive advisory lock on a file, released on drop
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock on `path` is held, creating the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    /// `Ok(None)` when another process holds the lock
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file: Some(file),
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release early. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                tracing::debug!("Failed to unlock {:?}: {}", self.path, e);
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?)
}

/// One mutex per repository uid. Entries are created on demand and evicted
/// when the repository is removed, unless a caller still holds the mutex: a
/// uid maps to a single mutex for as long as anyone can lock it.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the entry for `uid` if the table holds the only reference.
    pub fn evict(&self, uid: &str) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        match locks.get(uid) {
            Some(lock) if Arc::strong_count(lock) == 1 => {
                locks.remove(uid);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
