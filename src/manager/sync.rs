//! Index update algorithms
//!
//! Workspace and local repositories are rebuilt in one commit from their
//! source. Remote repositories are synchronized in two steps: a cache-only
//! fetch under the cross-process file lock, then either an offline
//! incremental apply to the live context or a full rebuild into a secondary
//! context whose files replace the live ones.

use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{dispose, IndexManager, UpdateOutcome};
use crate::error::{IndexError, Result};
use crate::indexer::{copy_index_files, IndexState, IndexingContext};
use crate::lock::{FileLock, LOCK_FILE};
use crate::model::{RepositoryDescriptor, RepositoryScope};
use crate::remote::{self, FetchResult, TransferPlan};
use crate::scanner;

/// Directory of the secondary context inside a repository's cache directory
const SECONDARY_DIR: &str = "lucene";

impl IndexManager {
    /// Bring one repository's index up to date. `force` makes a remote
    /// repository rebuild from its full snapshot.
    ///
    /// Network failures leave the index untouched and are returned to the
    /// caller; there is no retry within the call.
    pub fn update_index(&self, uid: &str, force: bool, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        let repository = self.repository(uid)?;
        if self.context(uid).is_none() {
            tracing::debug!("Index of {} is disabled, nothing to update", uid);
            return Ok(UpdateOutcome::Disabled);
        }

        let outcome = {
            let lock = self.locks.get(uid);
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            match self.context(uid) {
                None => Ok(UpdateOutcome::Disabled),
                Some(ctx) => {
                    self.listeners.notify(|l| l.index_updating(&repository));
                    match repository.scope {
                        RepositoryScope::Workspace => self.rebuild_workspace(&ctx, cancel),
                        RepositoryScope::Local => self.rebuild_local(&repository, &ctx, cancel),
                        RepositoryScope::Settings | RepositoryScope::Unknown => {
                            self.sync_remote(&repository, ctx, force, cancel)
                        }
                    }
                }
            }
        };

        match &outcome {
            Ok(UpdateOutcome::Disabled) => {}
            Ok(result) => {
                tracing::info!("Updated index of {}: {:?}", uid, result);
                self.listeners.notify(|l| l.index_changed(&repository));
            }
            Err(e) if e.is_cancelled() => tracing::info!("Update of {} cancelled", uid),
            Err(e) if e.is_transient() => {
                tracing::warn!("Update of {} abandoned, index left unchanged: {}", uid, e)
            }
            Err(e) => tracing::error!("Update of {} failed: {}", uid, e),
        }
        outcome
    }

    fn rebuild_workspace(&self, ctx: &IndexingContext, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        let projects = self.workspace.as_ref().map(|w| w.artifacts()).unwrap_or_default();
        let mut records = Vec::with_capacity(projects.len());
        for (key, path) in &projects {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            records.push(scanner::record_for_file(key, path, ctx.level())?);
        }

        ctx.replace_all(&records, IndexState::now())?;
        ctx.set_searchable(true);
        Ok(UpdateOutcome::Rebuilt)
    }

    fn rebuild_local(
        &self,
        repository: &RepositoryDescriptor,
        ctx: &IndexingContext,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        let basedir = repository
            .basedir
            .as_deref()
            .ok_or_else(|| IndexError::Config(format!("local repository {} has no directory", repository.uid)))?;

        let (records, _) = scanner::scan_repository(basedir, ctx.level(), cancel)?;
        ctx.replace_all(&records, IndexState::now())?;
        ctx.set_searchable(true);
        Ok(UpdateOutcome::Rebuilt)
    }

    fn sync_remote(
        &self,
        repository: &RepositoryDescriptor,
        live: Arc<IndexingContext>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        let cache_dir = self.cache_dir(&repository.uid);
        let _file_lock = FileLock::acquire(&cache_dir.join(LOCK_FILE))?;

        let fetcher = self.fetchers.create(repository)?;
        let require_full = force || !live.is_searchable();
        let fetched = remote::fetch_to_cache(
            fetcher.as_ref(),
            &cache_dir,
            live.state().as_ref(),
            require_full,
            cancel,
        )?;

        match &fetched.plan {
            TransferPlan::UpToDate => {
                live.set_searchable(true);
                Ok(UpdateOutcome::UpToDate)
            }
            TransferPlan::Incremental(range) => {
                let mut records = Vec::new();
                for chunk in &fetched.chunks {
                    if cancel.is_cancelled() {
                        return Err(IndexError::Cancelled);
                    }
                    records.extend(remote::read_chunk(chunk)?);
                }
                let stats = live.update(&records, fetched.remote.index_state())?;
                live.set_searchable(true);
                tracing::debug!(
                    "Applied incremental chunks {:?} to {}: {} added, {} deleted",
                    range,
                    repository.uid,
                    stats.added,
                    stats.deleted
                );
                Ok(UpdateOutcome::Incremental)
            }
            TransferPlan::Full => {
                self.rebuild_from_snapshot(repository, live, &fetched, cancel)?;
                Ok(UpdateOutcome::Full)
            }
        }
    }

    /// Build the snapshot offline in a secondary context under the cache
    /// directory, then swap its files in for the live context's.
    fn rebuild_from_snapshot(
        &self,
        repository: &RepositoryDescriptor,
        live: Arc<IndexingContext>,
        fetched: &FetchResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let uid = repository.uid.as_str();
        let snapshot = fetched
            .full
            .as_deref()
            .ok_or_else(|| IndexError::InvalidRemoteIndex("full transfer without snapshot".to_string()))?;
        let records = remote::read_chunk(snapshot)?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let level = live.level();
        let secondary_dir = self.cache_dir(uid).join(SECONDARY_DIR);
        if secondary_dir.exists() {
            fs::remove_dir_all(&secondary_dir)?;
        }
        {
            let secondary = IndexingContext::open(&format!("{}-cache", uid), &secondary_dir, level)?;
            secondary.replace_all(&records, fetched.remote.index_state())?;
        }
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        self.contexts().remove(uid);
        dispose(live, true)?;

        let live_dir = self.context_dir(uid);
        let swapped = copy_index_files(&secondary_dir, &live_dir).and_then(|_| IndexingContext::open(uid, &live_dir, level));
        let ctx = match swapped {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!("Cannot install rebuilt index of {}: {}", uid, e);
                if live_dir.exists() {
                    fs::remove_dir_all(&live_dir)?;
                }
                let empty = IndexingContext::open(uid, &live_dir, level)?;
                self.contexts().insert(uid.to_string(), Arc::new(empty));
                return Err(e);
            }
        };

        ctx.set_searchable(true);
        tracing::info!("Rebuilt index of {} with {} documents", uid, ctx.num_docs());
        self.contexts().insert(uid.to_string(), Arc::new(ctx));
        Ok(())
    }
}
