//! Filesystem watcher for the local repository
//!
//! Uses the `notify` crate to watch the local repository directory and
//! schedules an update of its index once changes settle. Debounces rapid
//! changes so a build installing many artifacts triggers one update.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};
use crate::manager::IndexManager;
use crate::scanner;

/// Watches a repository directory and schedules index updates on changes
pub struct RepositoryWatcher {
    debounce: Duration,
}

impl Default for RepositoryWatcher {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

impl RepositoryWatcher {
    pub fn with_debounce(debounce: Duration) -> Self {
        Self { debounce }
    }

    /// Watch the basedir of repository `uid` until `stop` is cancelled.
    /// Returns the number of updates scheduled.
    pub fn watch(&self, manager: &Arc<IndexManager>, uid: &str, stop: &CancellationToken) -> Result<usize> {
        let repository = manager.repository(uid)?;
        let basedir = repository
            .basedir
            .ok_or_else(|| IndexError::Config(format!("repository {} has no directory to watch", uid)))?;
        std::fs::create_dir_all(&basedir)?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;
        watcher.watch(&basedir, RecursiveMode::Recursive)?;
        tracing::info!("Watching {} for changes to {}", basedir.display(), uid);

        let mut pending: HashSet<PathBuf> = HashSet::new();
        let mut last_event = Instant::now();
        let mut scheduled = 0;

        while !stop.is_cancelled() {
            match rx.recv_timeout(self.debounce) {
                Ok(event) => {
                    if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) = event.kind {
                        let relevant = event.paths.into_iter().filter(|p| is_relevant(&basedir, p));
                        let before = pending.len();
                        pending.extend(relevant);
                        if pending.len() != before {
                            last_event = Instant::now();
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if !pending.is_empty() && last_event.elapsed() >= self.debounce {
                        tracing::info!("{} artifact file(s) changed in {}, updating index", pending.len(), uid);
                        manager.schedule_update(uid, false)?;
                        scheduled += 1;
                        pending.clear();
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok(scheduled)
    }
}

/// Artifact files below `basedir`, skipping hidden directories
fn is_relevant(basedir: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(basedir) else {
        return false;
    };
    let hidden = relative
        .components()
        .any(|c| c.as_os_str().to_str().map(|s| s.starts_with('.')).unwrap_or(false));
    !hidden && scanner::is_artifact_file(path)
}
