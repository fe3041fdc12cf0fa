//! Index coordinator
//!
//! `IndexManager` owns every repository's `IndexingContext`. Each operation
//! on a repository runs under that repository's mutex from the lock table,
//! keyed by uid, so reads, writes and updates of one repository never
//! interleave. The context map itself is only touched while holding the
//! repository lock (repository lock first, then map lock).
//!
//! On disk, `<index_dir>/<uid>/` holds the live index and
//! `<index_dir>/<uid>-cache/` holds downloaded remote index files.

mod listeners;
mod sync;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::details::IndexDetails;
use crate::error::{IndexError, Result};
use crate::handle::{ArtifactIndex, CompositeIndex, IndexHandle};
use crate::indexer::schema::{package_name, simple_class_name};
use crate::indexer::{IndexStatus, IndexingContext};
use crate::lock::LockTable;
use crate::model::{
    fold_artifacts, ArtifactKey, ArtifactRecord, ClassifierMask, IndexDetailLevel, IndexedArtifact,
    IndexedArtifactFile, RepositoryDescriptor, SearchExpression, SearchType,
};
use crate::query::{build_find_query, build_search_query, FindQuery};
use crate::queue::{UpdateCommand, UpdateQueue, UpdateStatus};
use crate::remote::{DefaultFetcherFactory, FetcherFactory, HttpSettings};
use crate::scanner;

pub use listeners::IndexListener;
use listeners::ListenerSet;

/// Result of one `update_index` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The repository has no index
    Disabled,
    /// Workspace or local index rebuilt from scratch
    Rebuilt,
    /// Remote index replaced from a full snapshot
    Full,
    /// Remote index advanced by incremental chunks
    Incremental,
    /// Remote index already current
    UpToDate,
}

/// Source of the artifacts produced by workspace projects
pub trait WorkspaceProjects: Send + Sync {
    fn artifacts(&self) -> Vec<(ArtifactKey, PathBuf)>;
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub index_dir: PathBuf,
    pub http: HttpSettings,
    /// Level for repositories without a persisted or configured one
    pub default_level: IndexDetailLevel,
    /// Configured levels, used until a level is persisted
    pub levels: BTreeMap<String, IndexDetailLevel>,
}

impl ManagerConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            http: HttpSettings::default(),
            default_level: IndexDetailLevel::Min,
            levels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryStatus {
    pub repository: RepositoryDescriptor,
    pub level: IndexDetailLevel,
    pub index: Option<IndexStatus>,
}

pub struct IndexManager {
    index_dir: PathBuf,
    default_level: IndexDetailLevel,
    configured_levels: BTreeMap<String, IndexDetailLevel>,
    repositories: Mutex<BTreeMap<String, RepositoryDescriptor>>,
    contexts: Mutex<HashMap<String, Arc<IndexingContext>>>,
    details: Mutex<IndexDetails>,
    locks: LockTable,
    listeners: ListenerSet,
    fetchers: Box<dyn FetcherFactory>,
    workspace: Option<Arc<dyn WorkspaceProjects>>,
    queue: UpdateQueue,
}

impl IndexManager {
    pub fn new(config: ManagerConfig) -> Result<Self> {
        fs::create_dir_all(&config.index_dir)?;
        let details = IndexDetails::load(&config.index_dir)?;

        Ok(Self {
            index_dir: config.index_dir,
            default_level: config.default_level,
            configured_levels: config.levels,
            repositories: Mutex::new(BTreeMap::new()),
            contexts: Mutex::new(HashMap::new()),
            details: Mutex::new(details),
            locks: LockTable::new(),
            listeners: ListenerSet::default(),
            fetchers: Box::new(DefaultFetcherFactory::new(config.http)),
            workspace: None,
            queue: UpdateQueue::new(),
        })
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceProjects>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_fetcher_factory(mut self, factory: impl FetcherFactory + 'static) -> Self {
        self.fetchers = Box::new(factory);
        self
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn context_dir(&self, uid: &str) -> PathBuf {
        self.index_dir.join(uid)
    }

    pub fn cache_dir(&self, uid: &str) -> PathBuf {
        self.index_dir.join(format!("{}-cache", uid))
    }

    pub fn add_listener(&self, listener: Arc<dyn IndexListener>) -> bool {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn IndexListener>) -> bool {
        self.listeners.remove(listener)
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<String, RepositoryDescriptor>> {
        self.repositories.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn contexts(&self) -> MutexGuard<'_, HashMap<String, Arc<IndexingContext>>> {
        self.contexts.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn details(&self) -> MutexGuard<'_, IndexDetails> {
        self.details.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn repositories(&self) -> Vec<RepositoryDescriptor> {
        self.registry().values().cloned().collect()
    }

    pub fn repository(&self, uid: &str) -> Result<RepositoryDescriptor> {
        self.registry()
            .get(uid)
            .cloned()
            .ok_or_else(|| IndexError::RepositoryNotFound(uid.to_string()))
    }

    /// Persisted level of `uid`, else the configured one, else the default
    pub fn detail_level(&self, uid: &str) -> IndexDetailLevel {
        self.details()
            .get(uid)
            .or_else(|| self.configured_levels.get(uid).copied())
            .unwrap_or(self.default_level)
    }

    /// The live context, if the repository has one
    pub fn context(&self, uid: &str) -> Option<Arc<IndexingContext>> {
        self.contexts().get(uid).cloned()
    }

    /// Reuse the live context when its level matches, otherwise close (and
    /// delete) the old one and open a new one. Caller holds the repository lock.
    fn context_locked(
        &self,
        repository: &RepositoryDescriptor,
        level: IndexDetailLevel,
    ) -> Result<Option<Arc<IndexingContext>>> {
        let uid = repository.uid.as_str();
        let previous = {
            let mut contexts = self.contexts();
            match contexts.get(uid) {
                Some(ctx) if ctx.level() == level => return Ok(Some(Arc::clone(ctx))),
                _ => contexts.remove(uid),
            }
        };

        if let Some(previous) = previous {
            tracing::info!("Index detail level of {} changed to {}", uid, level);
            dispose(previous, true)?;
            self.listeners.notify(|l| l.index_removed(repository));
        }

        if !level.is_enabled() {
            return Ok(None);
        }

        let ctx = Arc::new(IndexingContext::open(uid, &self.context_dir(uid), level)?);
        self.contexts().insert(uid.to_string(), Arc::clone(&ctx));
        self.listeners.notify(|l| l.index_added(repository));
        Ok(Some(ctx))
    }

    /// Idempotent: the same level returns the same live context.
    pub fn get_or_create_context(
        &self,
        repository: &RepositoryDescriptor,
        level: IndexDetailLevel,
    ) -> Result<Option<Arc<IndexingContext>>> {
        self.registry()
            .entry(repository.uid.clone())
            .or_insert_with(|| repository.clone());

        let lock = self.locks.get(&repository.uid);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        self.context_locked(repository, level)
    }

    /// Register a repository and open its index at the persisted level.
    pub fn repository_added(&self, repository: RepositoryDescriptor) -> Result<Option<Arc<IndexingContext>>> {
        let level = self.detail_level(&repository.uid);
        tracing::info!("Repository {} added ({}, index {})", repository.uid, repository.url, level);
        self.registry().insert(repository.uid.clone(), repository.clone());

        let lock = self.locks.get(&repository.uid);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        self.context_locked(&repository, level)
    }

    /// Unregister a repository, closing its index. With `purge`, the index
    /// files, the download cache and the persisted level are deleted too.
    pub fn repository_removed(&self, uid: &str, purge: bool) -> Result<()> {
        let lock = self.locks.get(uid);
        {
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            let repository = self
                .registry()
                .remove(uid)
                .ok_or_else(|| IndexError::RepositoryNotFound(uid.to_string()))?;

            let ctx = self.contexts().remove(uid);
            if let Some(ctx) = ctx {
                dispose(ctx, purge)?;
                self.listeners.notify(|l| l.index_removed(&repository));
            }

            if purge {
                let cache_dir = self.cache_dir(uid);
                if cache_dir.exists() {
                    fs::remove_dir_all(&cache_dir)?;
                }
                let mut details = self.details();
                if details.remove(uid) {
                    details.save()?;
                }
            }
            tracing::info!("Repository {} removed", uid);
        }
        drop(lock);
        self.locks.evict(uid);
        Ok(())
    }

    /// Persist a new level, recreate the context accordingly and schedule a
    /// repopulate when the level changed.
    pub fn set_index_details(self: &Arc<Self>, uid: &str, level: IndexDetailLevel) -> Result<()> {
        let repository = self.repository(uid)?;
        let changed = {
            let mut details = self.details();
            let changed = details.set(uid, level);
            if changed {
                details.save()?;
            }
            changed
        };

        {
            let lock = self.locks.get(uid);
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            self.context_locked(&repository, level)?;
        }

        if changed && level.is_enabled() {
            self.schedule_update(uid, false)?;
        }
        Ok(())
    }

    /// Run `read` against the live context under the repository lock.
    /// Disabled repositories yield the empty result.
    fn with_context<T: Default>(&self, uid: &str, read: impl FnOnce(&IndexingContext) -> Result<T>) -> Result<T> {
        self.repository(uid)?;
        let lock = self.locks.get(uid);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        match self.context(uid) {
            Some(ctx) => read(&ctx),
            None => Ok(T::default()),
        }
    }

    pub fn find(
        &self,
        uid: &str,
        group_id: Option<SearchExpression>,
        artifact_id: Option<SearchExpression>,
        version: Option<SearchExpression>,
        packaging: Option<SearchExpression>,
    ) -> Result<Vec<IndexedArtifact>> {
        self.find_all(uid, &FindQuery::from_options(group_id, artifact_id, version, packaging))
    }

    /// Matching artifacts folded per identity, in identity order.
    pub fn find_all(&self, uid: &str, query: &FindQuery) -> Result<Vec<IndexedArtifact>> {
        self.with_context(uid, |ctx| {
            let query = build_find_query(ctx.fields(), query)?;
            let hits = ctx.search(query.as_ref())?;
            Ok(fold_artifacts(hits.iter().map(|(_, record)| IndexedArtifact::from_record(record))))
        })
    }

    /// Canned search keyed by `classname:packageName:groupId:artifactId`.
    pub fn search(
        &self,
        uid: &str,
        term: &str,
        search_type: SearchType,
        mask: ClassifierMask,
    ) -> Result<BTreeMap<String, IndexedArtifact>> {
        self.with_context(uid, |ctx| {
            let query = build_search_query(ctx.fields(), term, search_type, mask)?;
            let hits = ctx.search(query.as_ref())?;
            Ok(fold_search_hits(&hits, term, search_type))
        })
    }

    /// Look a file up by its checksum.
    pub fn identify(&self, uid: &str, file: &Path) -> Result<Option<IndexedArtifactFile>> {
        let sha1 = scanner::sha1_file(file)?;
        self.with_context(uid, |ctx| {
            let query = build_search_query(ctx.fields(), &sha1, SearchType::Sha1, ClassifierMask::ALL)?;
            let hits = ctx.search(query.as_ref())?;
            Ok(hits.iter().map(|(_, record)| IndexedArtifactFile::from(record)).min())
        })
    }

    pub fn get_indexed_artifact_file(&self, uid: &str, key: &ArtifactKey) -> Result<Option<IndexedArtifactFile>> {
        let mut query = FindQuery::new()
            .group(SearchExpression::exact(&key.group_id))
            .artifact(SearchExpression::exact(&key.artifact_id))
            .version(SearchExpression::exact(&key.version));
        if let Some(classifier) = &key.classifier {
            query = query.classifier(SearchExpression::exact(classifier));
        }

        self.with_context(uid, |ctx| {
            let query = build_find_query(ctx.fields(), &query)?;
            let hits = ctx.search(query.as_ref())?;
            Ok(hits
                .iter()
                .filter(|(_, record)| record.classifier == key.classifier)
                .map(|(_, record)| IndexedArtifactFile::from(record))
                .min())
        })
    }

    pub fn add_artifact(&self, uid: &str, file: &Path, key: &ArtifactKey) -> Result<()> {
        self.add_artifacts(uid, &[(key.clone(), file.to_path_buf())]).map(|_| ())
    }

    /// Index several artifact files in one commit. Returns how many were
    /// written; zero when the repository has no index.
    pub fn add_artifacts(&self, uid: &str, artifacts: &[(ArtifactKey, PathBuf)]) -> Result<usize> {
        let repository = self.repository(uid)?;
        let added = {
            let lock = self.locks.get(uid);
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            let Some(ctx) = self.context(uid) else {
                return Ok(0);
            };
            let records = artifacts
                .iter()
                .map(|(key, path)| scanner::record_for_file(key, path, ctx.level()))
                .collect::<Result<Vec<ArtifactRecord>>>()?;
            ctx.apply(&records)?.added
        };
        self.listeners.notify(|l| l.index_changed(&repository));
        Ok(added)
    }

    pub fn remove_artifact(&self, uid: &str, file: &Path, key: &ArtifactKey) -> Result<()> {
        let repository = self.repository(uid)?;
        {
            let lock = self.locks.get(uid);
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            let Some(ctx) = self.context(uid) else {
                return Ok(());
            };
            let uinfo = ArtifactRecord::new(key, "", scanner::artifact_extension(file)).uinfo();
            ctx.remove(&uinfo)?;
        }
        self.listeners.notify(|l| l.index_changed(&repository));
        Ok(())
    }

    /// Queue an update of `uid` on the background worker.
    pub fn schedule_update(self: &Arc<Self>, uid: &str, force: bool) -> Result<()> {
        self.repository(uid)?;
        let manager = Arc::clone(self);
        let target = uid.to_string();
        self.queue.schedule(UpdateCommand::new(uid, move |cancel| {
            manager.update_index(&target, force, cancel).map(|_| ())
        }));
        Ok(())
    }

    /// Queue updates of every repository with an index, in uid order.
    pub fn schedule_all(self: &Arc<Self>, force: bool) -> Result<usize> {
        let uids: Vec<String> = self
            .repositories()
            .into_iter()
            .map(|r| r.uid)
            .filter(|uid| self.context(uid).is_some())
            .collect();
        for uid in &uids {
            self.schedule_update(uid, force)?;
        }
        Ok(uids.len())
    }

    pub fn cancel_updates(&self) {
        self.queue.cancel();
    }

    /// Block until scheduled updates are done.
    pub fn wait_for_updates(&self) -> UpdateStatus {
        self.queue.wait_idle()
    }

    pub fn status(&self) -> Vec<RepositoryStatus> {
        self.repositories()
            .into_iter()
            .map(|repository| {
                let lock = self.locks.get(&repository.uid);
                let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
                let ctx = self.context(&repository.uid);
                RepositoryStatus {
                    level: ctx
                        .as_ref()
                        .map(|c| c.level())
                        .unwrap_or_else(|| self.detail_level(&repository.uid)),
                    index: ctx.map(|c| c.status()),
                    repository,
                }
            })
            .collect()
    }

    pub fn index_handle(self: &Arc<Self>, uid: &str) -> Result<IndexHandle> {
        Ok(IndexHandle::new(Arc::clone(self), self.repository(uid)?))
    }

    /// Union over `uids`, queried in the given order.
    pub fn composite(self: &Arc<Self>, uids: &[&str]) -> Result<CompositeIndex> {
        let mut members: Vec<Arc<dyn ArtifactIndex>> = Vec::with_capacity(uids.len());
        for uid in uids {
            members.push(Arc::new(self.index_handle(uid)?));
        }
        Ok(CompositeIndex::new(members))
    }

    /// Union over every repository with an index: workspace, then local,
    /// then the others by uid.
    pub fn composite_all(self: &Arc<Self>) -> Result<CompositeIndex> {
        let mut uids: Vec<String> = self
            .repositories()
            .into_iter()
            .filter(|r| self.context(&r.uid).is_some())
            .map(|r| r.uid)
            .collect();
        uids.sort_by_key(|uid| match uid.as_str() {
            RepositoryDescriptor::WORKSPACE_UID => 0,
            RepositoryDescriptor::LOCAL_UID => 1,
            _ => 2,
        });
        let refs: Vec<&str> = uids.iter().map(String::as_str).collect();
        self.composite(&refs)
    }
}

/// Close a context, deleting its files when `delete` is set.
fn dispose(ctx: Arc<IndexingContext>, delete: bool) -> Result<()> {
    let dir = ctx.directory().to_path_buf();
    match Arc::try_unwrap(ctx) {
        Ok(ctx) if delete => ctx.delete_files(),
        Ok(_) => Ok(()),
        Err(shared) => {
            tracing::debug!("Index context {} is still referenced while closing", shared.uid());
            if delete {
                shared.purge()?;
                drop(shared);
                if dir.exists() {
                    fs::remove_dir_all(&dir)?;
                }
            }
            Ok(())
        }
    }
}

fn fold_search_hits(
    hits: &[(f32, ArtifactRecord)],
    term: &str,
    search_type: SearchType,
) -> BTreeMap<String, IndexedArtifact> {
    let mut results: BTreeMap<String, IndexedArtifact> = BTreeMap::new();
    let mut insert = |artifact: IndexedArtifact, file: IndexedArtifactFile| {
        results
            .entry(artifact.search_key())
            .or_insert(artifact)
            .add_file(file);
    };

    let needle = term.trim().to_lowercase();
    for (_, record) in hits {
        let file = IndexedArtifactFile::from(record);
        if search_type == SearchType::ClassName {
            for classname in &record.classnames {
                let simple = simple_class_name(classname);
                if simple.to_lowercase().starts_with(&needle) {
                    let artifact = IndexedArtifact::new(&record.group_id, &record.artifact_id, &record.packaging)
                        .with_class(simple, package_name(classname));
                    insert(artifact, file.clone());
                }
            }
        } else {
            insert(
                IndexedArtifact::new(&record.group_id, &record.artifact_id, &record.packaging),
                file,
            );
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositoryScope;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn manager(dir: &TempDir) -> Arc<IndexManager> {
        Arc::new(IndexManager::new(ManagerConfig::new(dir.path().join("indexes"))).unwrap())
    }

    fn jar(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_unknown_repository_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let err = manager.find("nope", None, None, None, None).unwrap_err();
        assert!(matches!(err, IndexError::RepositoryNotFound(_)));
    }

    #[test]
    fn test_add_find_remove() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let repo = RepositoryDescriptor::remote("repo1", "file:///nowhere").with_scope(RepositoryScope::Local);
        manager.repository_added(repo).unwrap();

        let file = jar(dir.path(), "lib-1.0.jar", b"lib");
        let key = ArtifactKey::new("com.acme", "lib", "1.0");
        manager.add_artifact("repo1", &file, &key).unwrap();

        let found = manager
            .find("repo1", Some(SearchExpression::exact("com.acme")), None, None, None)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].files.len(), 1);

        let identified = manager.identify("repo1", &file).unwrap().unwrap();
        assert_eq!(identified.key(), key);
        assert_eq!(manager.get_indexed_artifact_file("repo1", &key).unwrap().unwrap().file_name, "lib-1.0.jar");

        manager.remove_artifact("repo1", &file, &key).unwrap();
        assert!(manager.find("repo1", None, None, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_class_name_search_keys_per_class() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let repo = RepositoryDescriptor::remote("central", "file:///nowhere");
        let ctx = manager
            .get_or_create_context(&repo, IndexDetailLevel::Full)
            .unwrap()
            .unwrap();

        let mut record = ArtifactRecord::new(&ArtifactKey::new("org.acme", "widgets", "1.0"), "jar", "jar");
        record.classnames = vec!["org/acme/Widget".to_string(), "org/acme/ui/WidgetPanel".to_string(), "org/acme/Other".to_string()];
        ctx.apply([&record]).unwrap();

        let results = manager
            .search("central", "widget", SearchType::ClassName, ClassifierMask::NONE)
            .unwrap();
        let keys: Vec<&String> = results.keys().collect();
        assert_eq!(keys, vec!["Widget:org.acme:org.acme:widgets", "WidgetPanel:org.acme.ui:org.acme:widgets"]);
    }

    #[test]
    fn test_level_change_recreates_context() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let repo = RepositoryDescriptor::remote("central", "file:///nowhere");

        let min = manager.get_or_create_context(&repo, IndexDetailLevel::Min).unwrap().unwrap();
        let again = manager.get_or_create_context(&repo, IndexDetailLevel::Min).unwrap().unwrap();
        assert!(Arc::ptr_eq(&min, &again));
        drop((min, again));

        let full = manager.get_or_create_context(&repo, IndexDetailLevel::Full).unwrap().unwrap();
        assert_eq!(full.level(), IndexDetailLevel::Full);
        drop(full);

        assert!(manager.get_or_create_context(&repo, IndexDetailLevel::Disabled).unwrap().is_none());
        assert!(manager.context("central").is_none());
        assert!(!manager.context_dir("central").exists());
    }

    #[test]
    fn test_remove_with_purge_evicts_everything() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.repository_added(RepositoryDescriptor::remote("central", "file:///nowhere")).unwrap();
        manager.set_index_details("central", IndexDetailLevel::Full).unwrap();
        manager.wait_for_updates();

        manager.repository_removed("central", true).unwrap();
        assert!(!manager.context_dir("central").exists());
        assert!(manager.repository("central").is_err());
        assert!(manager.locks.is_empty());
        assert_eq!(manager.detail_level("central"), IndexDetailLevel::Min);
        assert!(matches!(
            manager.repository_removed("central", true),
            Err(IndexError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_recreated_repository_shares_held_lock() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let repo = RepositoryDescriptor::remote("r", "file:///nowhere");
        manager.repository_added(repo.clone()).unwrap();

        let held = manager.locks.get("r");
        manager.repository_removed("r", false).unwrap();
        manager.repository_added(repo).unwrap();
        assert!(Arc::ptr_eq(&held, &manager.locks.get("r")));

        let guard = held.lock().unwrap();
        assert!(manager.locks.get("r").try_lock().is_err());
        drop(guard);
        drop(held);

        manager.repository_removed("r", false).unwrap();
        assert!(manager.locks.is_empty());
    }

    #[test]
    fn test_delete_empties_a_context_still_in_use() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let repo = RepositoryDescriptor::remote("central", "file:///nowhere");
        let ctx = manager.get_or_create_context(&repo, IndexDetailLevel::Min).unwrap().unwrap();
        let record = ArtifactRecord::new(&ArtifactKey::new("com.acme", "lib", "1.0"), "jar", "jar");
        ctx.apply([&record]).unwrap();
        assert_eq!(ctx.num_docs(), 1);

        manager.repository_removed("central", true).unwrap();
        assert_eq!(ctx.num_docs(), 0);
        assert!(!ctx.is_searchable());
        assert!(ctx.state().is_none());
        assert!(!manager.context_dir("central").exists());
    }

    struct Updates(Mutex<Vec<String>>);

    impl IndexListener for Updates {
        fn index_updating(&self, repository: &RepositoryDescriptor) {
            self.0.lock().unwrap().push(repository.uid.clone());
        }
    }

    #[test]
    fn test_no_updating_event_when_disabled_under_lock() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let updates = Arc::new(Updates(Mutex::new(Vec::new())));
        manager.add_listener(updates.clone());
        manager
            .repository_added(RepositoryDescriptor::remote("central", "file:///nowhere"))
            .unwrap();

        let lock = manager.locks.get("central");
        let guard = lock.lock().unwrap();
        let worker = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.update_index("central", false, &CancellationToken::new()))
        };
        thread::sleep(Duration::from_millis(200));
        let disabled = manager.contexts().remove("central");
        drop(guard);

        assert_eq!(worker.join().unwrap().unwrap(), UpdateOutcome::Disabled);
        assert!(updates.0.lock().unwrap().is_empty());
        drop(disabled);
    }
}
