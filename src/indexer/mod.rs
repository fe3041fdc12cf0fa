//! Tantivy-backed indexing context for one repository
//!
//! An `IndexingContext` owns one directory on disk. Every mutation runs in a
//! single writer and ends with one commit followed by a reader reload, so a
//! searcher sees either all of a batch or none of it. Callers serialize
//! access per repository; the context itself only guards its own state.

pub mod schema;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query};
use tantivy::schema::{TantivyDocument, Term};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

use crate::error::Result;
use crate::model::{ArtifactRecord, IndexDetailLevel};
pub use schema::ArtifactFields;

const STATE_FILE: &str = "index-state.json";
const WRITER_HEAP_BYTES: usize = 30_000_000;

/// What the last completed populate/update left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    /// Remote index chain the content came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Last remote incremental chunk applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_incremental: Option<u64>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl IndexState {
    pub fn now() -> Self {
        Self {
            chain_id: None,
            last_incremental: None,
            timestamp: now_millis(),
        }
    }

    pub fn remote(chain_id: impl Into<String>, last_incremental: u64) -> Self {
        Self {
            chain_id: Some(chain_id.into()),
            last_incremental: Some(last_incremental),
            timestamp: now_millis(),
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Counts from one write batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub added: usize,
    pub deleted: usize,
}

/// Index health status
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub num_docs: u64,
    pub size_bytes: u64,
    pub searchable: bool,
    pub state: Option<IndexState>,
}

/// Live on-disk index bound to one repository and detail level
pub struct IndexingContext {
    uid: String,
    level: IndexDetailLevel,
    dir: PathBuf,
    index: Index,
    reader: IndexReader,
    fields: ArtifactFields,
    searchable: AtomicBool,
    state: Mutex<Option<IndexState>>,
}

impl std::fmt::Debug for IndexingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingContext")
            .field("uid", &self.uid)
            .field("level", &self.level)
            .field("dir", &self.dir)
            .field("searchable", &self.is_searchable())
            .finish()
    }
}

impl IndexingContext {
    /// Open the index in `dir`, creating an empty one if none exists.
    ///
    /// A context is searchable right away only if a previous populate left
    /// its state file behind.
    pub fn open(uid: &str, dir: &Path, level: IndexDetailLevel) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let schema = schema::build_schema();
        let index = Index::create_in_dir(dir, schema.clone()).or_else(|_| Index::open_in_dir(dir))?;
        let fields = ArtifactFields::new(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let state = read_state(dir);
        tracing::debug!("Opened index context {} at {:?} (state: {:?})", uid, dir, state);

        Ok(Self {
            uid: uid.to_string(),
            level,
            dir: dir.to_path_buf(),
            index,
            reader,
            fields,
            searchable: AtomicBool::new(state.is_some()),
            state: Mutex::new(state),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn level(&self) -> IndexDetailLevel {
        self.level
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn fields(&self) -> &ArtifactFields {
        &self.fields
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable.load(Ordering::SeqCst)
    }

    pub fn set_searchable(&self, searchable: bool) {
        self.searchable.store(searchable, Ordering::SeqCst);
    }

    pub fn state(&self) -> Option<IndexState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            num_docs: self.num_docs(),
            size_bytes: dir_size(&self.dir),
            searchable: self.is_searchable(),
            state: self.state(),
        }
    }

    fn writer(&self) -> Result<IndexWriter> {
        Ok(self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?)
    }

    /// Commit, let merges settle, then make the batch visible.
    fn commit(&self, mut writer: IndexWriter) -> Result<()> {
        writer.commit()?;
        writer.wait_merging_threads()?;
        self.reader.reload()?;
        Ok(())
    }

    fn write_one(&self, writer: &IndexWriter, record: &ArtifactRecord, stats: &mut ApplyStats) -> Result<()> {
        writer.delete_term(Term::from_field_text(self.fields.uinfo, &record.uinfo()));
        if record.deleted {
            stats.deleted += 1;
        } else {
            let record = record.clone().for_level(self.level);
            writer.add_document(self.fields.to_document(&record))?;
            stats.added += 1;
        }
        Ok(())
    }

    /// Add, replace or (for tombstones) delete records in one commit.
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a ArtifactRecord>) -> Result<ApplyStats> {
        let writer = self.writer()?;
        let mut stats = ApplyStats::default();
        for record in records {
            self.write_one(&writer, record, &mut stats)?;
        }
        self.commit(writer)?;
        Ok(stats)
    }

    pub fn remove(&self, uinfo: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.delete_term(Term::from_field_text(self.fields.uinfo, uinfo));
        self.commit(writer)
    }

    /// Swap the whole content for `records` in a single commit and record
    /// `state` as the result of a completed populate.
    pub fn replace_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a ArtifactRecord>,
        state: IndexState,
    ) -> Result<ApplyStats> {
        let writer = self.writer()?;
        writer.delete_all_documents()?;
        let mut stats = ApplyStats::default();
        for record in records {
            self.write_one(&writer, record, &mut stats)?;
        }
        self.commit(writer)?;
        self.write_state(state)?;
        Ok(stats)
    }

    /// Apply `records` on top of the current content and record `state`.
    pub fn update(&self, records: &[ArtifactRecord], state: IndexState) -> Result<ApplyStats> {
        let stats = self.apply(records)?;
        self.write_state(state)?;
        Ok(stats)
    }

    pub fn write_state(&self, state: IndexState) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&state)?)?;
        fs::rename(&tmp, &path)?;
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(state);
        Ok(())
    }

    /// Delete every document and forget the populate state.
    pub fn purge(&self) -> Result<()> {
        let writer = self.writer()?;
        writer.delete_all_documents()?;
        self.commit(writer)?;

        let path = self.dir.join(STATE_FILE);
        if path.exists() {
            fs::remove_file(path)?;
        }
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        self.set_searchable(false);
        Ok(())
    }

    /// Run `query` and return matching records, best score first.
    pub fn search(&self, query: &dyn Query) -> Result<Vec<(f32, ArtifactRecord)>> {
        let searcher = self.reader.searcher();
        let limit = (searcher.num_docs() as usize).max(1);
        let top_docs = searcher.search(query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            results.push((score, self.fields.from_document(&doc)));
        }
        Ok(results)
    }

    pub fn all_records(&self) -> Result<Vec<ArtifactRecord>> {
        Ok(self.search(&AllQuery)?.into_iter().map(|(_, r)| r).collect())
    }

    /// Close the context and delete its directory.
    pub fn delete_files(self) -> Result<()> {
        let dir = self.dir.clone();
        drop(self);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn read_state(dir: &Path) -> Option<IndexState> {
    let data = fs::read(dir.join(STATE_FILE)).ok()?;
    match serde_json::from_slice(&data) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!("Ignoring unreadable index state in {:?}: {}", dir, e);
            None
        }
    }
}

fn dir_size(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

/// Copy the index files of a closed context from `src` into `dst`, skipping
/// tantivy lock files.
pub fn copy_index_files(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(".lock") {
            continue;
        }
        fs::copy(entry.path(), dst.join(&name))?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactKey;
    use tempfile::TempDir;

    fn record(g: &str, a: &str, v: &str) -> ArtifactRecord {
        ArtifactRecord::new(&ArtifactKey::new(g, a, v), "jar", "jar")
    }

    #[test]
    fn test_fresh_context_is_not_searchable() {
        let dir = TempDir::new().unwrap();
        let ctx = IndexingContext::open("repo1", dir.path(), IndexDetailLevel::Min).unwrap();
        assert!(!ctx.is_searchable());
        assert_eq!(ctx.num_docs(), 0);
        assert!(ctx.state().is_none());
    }

    #[test]
    fn test_apply_replaces_by_uinfo_and_honors_tombstones() {
        let dir = TempDir::new().unwrap();
        let ctx = IndexingContext::open("repo1", dir.path(), IndexDetailLevel::Min).unwrap();

        let mut a = record("com.acme", "lib", "1.0");
        ctx.apply([&a, &record("com.acme", "lib", "1.1")]).unwrap();
        assert_eq!(ctx.num_docs(), 2);

        a.size = 42;
        ctx.apply([&a]).unwrap();
        assert_eq!(ctx.num_docs(), 2);
        let sizes: Vec<u64> = ctx.all_records().unwrap().iter().map(|r| r.size).collect();
        assert!(sizes.contains(&42));

        let stats = ctx.apply([&a.tombstone()]).unwrap();
        assert_eq!(stats, ApplyStats { added: 0, deleted: 1 });
        assert_eq!(ctx.num_docs(), 1);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let ctx = IndexingContext::open("repo1", dir.path(), IndexDetailLevel::Min).unwrap();
            ctx.replace_all([&record("g", "a", "1")], IndexState::remote("chain-1", 3))
                .unwrap();
        }
        let ctx = IndexingContext::open("repo1", dir.path(), IndexDetailLevel::Min).unwrap();
        assert!(ctx.is_searchable());
        assert_eq!(ctx.num_docs(), 1);
        assert_eq!(ctx.state().unwrap().last_incremental, Some(3));

        ctx.purge().unwrap();
        assert!(!ctx.is_searchable());
        assert_eq!(ctx.num_docs(), 0);
    }

    #[test]
    fn test_copy_index_files_and_reopen() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        {
            let ctx = IndexingContext::open("cache", src.path(), IndexDetailLevel::Min).unwrap();
            ctx.replace_all([&record("g", "a", "1"), &record("g", "b", "1")], IndexState::now())
                .unwrap();
        }
        copy_index_files(src.path(), dst.path()).unwrap();

        let ctx = IndexingContext::open("live", dst.path(), IndexDetailLevel::Min).unwrap();
        assert_eq!(ctx.num_docs(), 2);
        assert!(ctx.is_searchable());
    }

    #[test]
    fn test_delete_files_removes_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("repo1");
        let ctx = IndexingContext::open("repo1", &dir, IndexDetailLevel::Min).unwrap();
        ctx.apply([&record("g", "a", "1")]).unwrap();
        ctx.delete_files().unwrap();
        assert!(!dir.exists());
    }
}
