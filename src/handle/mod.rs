//! Read views over one or several repository indexes

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::manager::{IndexManager, UpdateOutcome};
use crate::model::{
    fold_artifacts, ArtifactKey, ClassifierMask, IndexedArtifact, IndexedArtifactFile, RepositoryDescriptor,
    SearchType,
};
use crate::query::FindQuery;

/// Queries every index view answers
pub trait ArtifactIndex: Send + Sync {
    fn find(&self, query: &FindQuery) -> Result<Vec<IndexedArtifact>>;

    fn search(
        &self,
        term: &str,
        search_type: SearchType,
        mask: ClassifierMask,
    ) -> Result<BTreeMap<String, IndexedArtifact>>;

    fn identify(&self, file: &Path) -> Result<Option<IndexedArtifactFile>>;

    fn get_indexed_artifact_file(&self, key: &ArtifactKey) -> Result<Option<IndexedArtifactFile>>;
}

/// One repository's index, bound by uid
#[derive(Clone)]
pub struct IndexHandle {
    manager: Arc<IndexManager>,
    repository: RepositoryDescriptor,
}

impl IndexHandle {
    pub(crate) fn new(manager: Arc<IndexManager>, repository: RepositoryDescriptor) -> Self {
        Self { manager, repository }
    }

    pub fn repository(&self) -> &RepositoryDescriptor {
        &self.repository
    }

    pub fn add_artifact(&self, file: &Path, key: &ArtifactKey) -> Result<()> {
        self.manager.add_artifact(&self.repository.uid, file, key)
    }

    pub fn add_artifacts(&self, artifacts: &[(ArtifactKey, PathBuf)]) -> Result<usize> {
        self.manager.add_artifacts(&self.repository.uid, artifacts)
    }

    pub fn remove_artifact(&self, file: &Path, key: &ArtifactKey) -> Result<()> {
        self.manager.remove_artifact(&self.repository.uid, file, key)
    }

    pub fn update_index(&self, force: bool, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        self.manager.update_index(&self.repository.uid, force, cancel)
    }

    pub fn schedule_update(&self, force: bool) -> Result<()> {
        self.manager.schedule_update(&self.repository.uid, force)
    }
}

impl ArtifactIndex for IndexHandle {
    fn find(&self, query: &FindQuery) -> Result<Vec<IndexedArtifact>> {
        self.manager.find_all(&self.repository.uid, query)
    }

    fn search(
        &self,
        term: &str,
        search_type: SearchType,
        mask: ClassifierMask,
    ) -> Result<BTreeMap<String, IndexedArtifact>> {
        self.manager.search(&self.repository.uid, term, search_type, mask)
    }

    fn identify(&self, file: &Path) -> Result<Option<IndexedArtifactFile>> {
        self.manager.identify(&self.repository.uid, file)
    }

    fn get_indexed_artifact_file(&self, key: &ArtifactKey) -> Result<Option<IndexedArtifactFile>> {
        self.manager.get_indexed_artifact_file(&self.repository.uid, key)
    }
}

/// Union of several indexes, queried in member order
#[derive(Clone, Default)]
pub struct CompositeIndex {
    members: Vec<Arc<dyn ArtifactIndex>>,
}

impl CompositeIndex {
    pub fn new(members: Vec<Arc<dyn ArtifactIndex>>) -> Self {
        Self { members }
    }

    pub fn push(&mut self, member: Arc<dyn ArtifactIndex>) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl ArtifactIndex for CompositeIndex {
    /// Equal identities from different members merge their files.
    fn find(&self, query: &FindQuery) -> Result<Vec<IndexedArtifact>> {
        let mut all = Vec::new();
        for member in &self.members {
            all.extend(member.find(query)?);
        }
        Ok(fold_artifacts(all))
    }

    /// Later members overwrite earlier ones on equal keys.
    fn search(
        &self,
        term: &str,
        search_type: SearchType,
        mask: ClassifierMask,
    ) -> Result<BTreeMap<String, IndexedArtifact>> {
        let mut results = BTreeMap::new();
        for member in &self.members {
            results.extend(member.search(term, search_type, mask)?);
        }
        Ok(results)
    }

    fn identify(&self, file: &Path) -> Result<Option<IndexedArtifactFile>> {
        for member in &self.members {
            if let Some(found) = member.identify(file)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn get_indexed_artifact_file(&self, key: &ArtifactKey) -> Result<Option<IndexedArtifactFile>> {
        for member in &self.members {
            if let Some(found) = member.get_indexed_artifact_file(key)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
