//! Publishes a repository's index in the remote layout
//!
//! Every publish rewrites the full snapshot. When a delta is given and a
//! chain already exists, the delta becomes the next incremental chunk;
//! otherwise a new chain starts. The properties file is written last so a
//! reader never sees a descriptor pointing at missing files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{chunk_name, read_chunk, write_chunk, RemoteIndexProperties, FULL_CHUNK, INDEX_DIR, PROPERTIES_FILE};
use crate::error::Result;
use crate::indexer::now_millis;
use crate::model::ArtifactRecord;

#[derive(Debug, Clone)]
pub struct IndexPacker {
    root: PathBuf,
    index_id: String,
}

impl IndexPacker {
    /// Packer writing into `<repository_base>/.index/`
    pub fn new(repository_base: &Path) -> Self {
        Self {
            root: repository_base.join(INDEX_DIR),
            index_id: String::new(),
        }
    }

    pub fn with_index_id(mut self, index_id: impl Into<String>) -> Self {
        self.index_id = index_id.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn properties(&self) -> Result<Option<RemoteIndexProperties>> {
        let path = self.root.join(PROPERTIES_FILE);
        if !path.exists() {
            return Ok(None);
        }
        RemoteIndexProperties::load(&path).map(Some)
    }

    /// The currently published snapshot, empty when nothing was published
    pub fn snapshot(&self) -> Result<Vec<ArtifactRecord>> {
        let path = self.root.join(FULL_CHUNK);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_chunk(&path)
    }

    pub fn publish(
        &self,
        snapshot: &[ArtifactRecord],
        delta: Option<&[ArtifactRecord]>,
    ) -> Result<RemoteIndexProperties> {
        fs::create_dir_all(&self.root)?;

        let previous = self.properties()?;
        let props = match (previous, delta) {
            (Some(previous), Some(delta)) => {
                let next = previous.last_incremental + 1;
                write_chunk(&self.root.join(chunk_name(next)), delta)?;
                RemoteIndexProperties {
                    index_id: self.index_id.clone(),
                    chain_id: previous.chain_id,
                    timestamp: now_millis(),
                    first_incremental: previous.first_incremental,
                    last_incremental: next,
                }
            }
            (previous, _) => {
                if previous.is_some() {
                    self.remove_chunks()?;
                }
                RemoteIndexProperties {
                    index_id: self.index_id.clone(),
                    chain_id: new_chain_id(),
                    timestamp: now_millis(),
                    first_incremental: 1,
                    last_incremental: 0,
                }
            }
        };

        write_chunk(&self.root.join(FULL_CHUNK), snapshot)?;
        props.store(&self.root.join(PROPERTIES_FILE))?;

        tracing::info!(
            "Published {} records to {:?} (chain {}, incremental {})",
            snapshot.len(),
            self.root,
            props.chain_id,
            props.last_incremental
        );
        Ok(props)
    }

    /// Publish `records` as the new state, deriving the delta from the
    /// previous snapshot. Returns `None` when nothing changed.
    pub fn publish_snapshot(&self, records: &[ArtifactRecord]) -> Result<Option<RemoteIndexProperties>> {
        if self.properties()?.is_none() {
            return self.publish(records, None).map(Some);
        }

        let previous: BTreeMap<String, ArtifactRecord> =
            self.snapshot()?.into_iter().map(|r| (r.uinfo(), r)).collect();
        let current: BTreeMap<String, &ArtifactRecord> = records.iter().map(|r| (r.uinfo(), r)).collect();

        let mut delta: Vec<ArtifactRecord> = current
            .iter()
            .filter(|(uinfo, record)| previous.get(*uinfo) != Some(**record))
            .map(|(_, record)| (*record).clone())
            .collect();
        delta.extend(
            previous
                .iter()
                .filter(|(uinfo, _)| !current.contains_key(*uinfo))
                .map(|(_, record)| record.tombstone()),
        );

        if delta.is_empty() {
            tracing::info!("Index at {:?} is unchanged", self.root);
            return Ok(None);
        }
        self.publish(records, Some(delta.as_slice())).map(Some)
    }

    /// Drop incremental chunks older than the newest `keep`.
    pub fn retain_incrementals(&self, keep: u64) -> Result<Option<RemoteIndexProperties>> {
        let Some(mut props) = self.properties()? else {
            return Ok(None);
        };
        let first = props.last_incremental.saturating_sub(keep) + 1;
        if first <= props.first_incremental {
            return Ok(Some(props));
        }
        for n in props.first_incremental..first {
            let path = self.root.join(chunk_name(n));
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        props.first_incremental = first;
        props.store(&self.root.join(PROPERTIES_FILE))?;
        Ok(Some(props))
    }

    fn remove_chunks(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name != FULL_CHUNK && name.ends_with(".gz") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

fn new_chain_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos)
}
