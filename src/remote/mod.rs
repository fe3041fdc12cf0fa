//! Remote index layout and transfer
//!
//! A published repository carries its index under `<base>/.index/`:
//!
//! - `nexus-maven-repository-index.properties`: chain id, timestamp and the
//!   range of incremental chunks still available
//! - `nexus-maven-repository-index.gz`: full snapshot of the current state
//! - `nexus-maven-repository-index.N.gz`: delta from state N-1 to state N
//!
//! Snapshot and chunks are gzip-compressed JSON lines of `ArtifactRecord`.
//! A record with `deleted: true` removes the entry with the same uinfo.
//!
//! Transfers only ever write into the repository's cache directory. Files are
//! downloaded to `<name>.part` and renamed when complete, so an interrupted
//! transfer leaves nothing half-written behind and the live index untouched.

mod fetcher;
pub mod packer;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};
use crate::indexer::IndexState;
use crate::model::ArtifactRecord;
use crate::properties::{self, Properties};

pub use fetcher::{
    copy_with_cancel, DefaultFetcherFactory, DirectoryFetcher, FetcherFactory, HttpFetcher, HttpSettings,
    ResourceFetcher,
};
pub use packer::IndexPacker;

pub const INDEX_DIR: &str = ".index";
pub const PROPERTIES_FILE: &str = "nexus-maven-repository-index.properties";
pub const FULL_CHUNK: &str = "nexus-maven-repository-index.gz";
/// Properties the cached full snapshot was downloaded under
const FULL_CHUNK_STATE: &str = "nexus-maven-repository-index.gz.properties";

const KEY_INDEX_ID: &str = "nexus.index.id";
const KEY_CHAIN_ID: &str = "nexus.index.chain-id";
const KEY_TIMESTAMP: &str = "nexus.index.timestamp";
const KEY_FIRST: &str = "nexus.index.first-incremental";
const KEY_LAST: &str = "nexus.index.last-incremental";

pub fn chunk_name(n: u64) -> String {
    format!("nexus-maven-repository-index.{}.gz", n)
}

/// The remote index descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIndexProperties {
    pub index_id: String,
    pub chain_id: String,
    pub timestamp: u64,
    /// Oldest incremental chunk still published
    pub first_incremental: u64,
    /// Chunk that produced the current snapshot, 0 for a fresh chain
    pub last_incremental: u64,
}

/// What a fetch has to transfer to bring a live index up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPlan {
    UpToDate,
    Incremental(RangeInclusive<u64>),
    Full,
}

impl RemoteIndexProperties {
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let chain_id = props
            .get(KEY_CHAIN_ID)
            .filter(|id| !id.is_empty())
            .cloned()
            .ok_or_else(|| IndexError::InvalidRemoteIndex(format!("missing {}", KEY_CHAIN_ID)))?;

        let number = |key: &str, default: u64| -> Result<u64> {
            match props.get(key) {
                None => Ok(default),
                Some(value) => value
                    .parse()
                    .map_err(|_| IndexError::InvalidRemoteIndex(format!("{} is not a number: {}", key, value))),
            }
        };

        let first_incremental = number(KEY_FIRST, 1)?;
        let last_incremental = number(KEY_LAST, 0)?;
        if first_incremental == 0 {
            return Err(IndexError::InvalidRemoteIndex(format!("{} must be at least 1", KEY_FIRST)));
        }

        Ok(Self {
            index_id: props.get(KEY_INDEX_ID).cloned().unwrap_or_default(),
            chain_id,
            timestamp: number(KEY_TIMESTAMP, 0)?,
            first_incremental,
            last_incremental,
        })
    }

    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(KEY_INDEX_ID.to_string(), self.index_id.clone());
        props.insert(KEY_CHAIN_ID.to_string(), self.chain_id.clone());
        props.insert(KEY_TIMESTAMP.to_string(), self.timestamp.to_string());
        props.insert(KEY_FIRST.to_string(), self.first_incremental.to_string());
        props.insert(KEY_LAST.to_string(), self.last_incremental.to_string());
        props
    }

    pub fn parse(content: &str) -> Result<Self> {
        Self::from_properties(&properties::parse(content))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_properties(&properties::load(path)?)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        properties::store(path, "remote artifact index", &self.to_properties())
    }

    /// The state a live index is in after applying everything published here
    pub fn index_state(&self) -> IndexState {
        IndexState::remote(self.chain_id.clone(), self.last_incremental)
    }

    /// Decide between incremental and full transfer. Incremental requires the
    /// same chain and every chunk after the live state still published.
    pub fn plan(&self, live: Option<&IndexState>, require_full: bool) -> TransferPlan {
        if require_full {
            return TransferPlan::Full;
        }
        let Some(live) = live else {
            return TransferPlan::Full;
        };
        if live.chain_id.as_deref() != Some(self.chain_id.as_str()) {
            return TransferPlan::Full;
        }
        let Some(live_last) = live.last_incremental else {
            return TransferPlan::Full;
        };

        if live_last == self.last_incremental {
            TransferPlan::UpToDate
        } else if live_last < self.last_incremental && live_last + 1 >= self.first_incremental {
            TransferPlan::Incremental(live_last + 1..=self.last_incremental)
        } else {
            TransferPlan::Full
        }
    }
}

/// Write records as a gzip JSON-lines chunk
pub fn write_chunk<'a>(path: &Path, records: impl IntoIterator<Item = &'a ArtifactRecord>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut encoder, record)?;
        encoder.write_all(b"\n")?;
        count += 1;
    }
    encoder.finish()?.flush()?;
    Ok(count)
}

pub fn read_chunk(path: &Path) -> Result<Vec<ArtifactRecord>> {
    let reader = BufReader::new(GzDecoder::new(BufReader::new(File::open(path)?)));
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            IndexError::InvalidRemoteIndex(format!("{:?} line {}: {}", path.file_name().unwrap_or_default(), number + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Files a fetch left in the cache directory, ready to apply
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub remote: RemoteIndexProperties,
    pub plan: TransferPlan,
    /// Full snapshot, when the plan is `Full`
    pub full: Option<PathBuf>,
    /// Incremental chunks in application order
    pub chunks: Vec<PathBuf>,
}

/// Bring the cache directory up to date with the remote index.
///
/// Never touches the live index. A missing incremental chunk falls back to
/// a full transfer.
pub fn fetch_to_cache(
    fetcher: &dyn ResourceFetcher,
    cache_dir: &Path,
    live: Option<&IndexState>,
    require_full: bool,
    cancel: &CancellationToken,
) -> Result<FetchResult> {
    fs::create_dir_all(cache_dir)?;

    let mut buf = Vec::new();
    fetcher.fetch(PROPERTIES_FILE, &mut buf, cancel)?;
    let remote = RemoteIndexProperties::parse(&String::from_utf8_lossy(&buf))?;

    let cached_path = cache_dir.join(PROPERTIES_FILE);
    let cached = RemoteIndexProperties::load(&cached_path).ok();
    let same_chain = cached.as_ref().is_some_and(|c| c.chain_id == remote.chain_id);
    if !same_chain {
        clear_chunks(cache_dir)?;
    }

    let mut plan = remote.plan(live, require_full);
    tracing::debug!("Remote index {} at {}: {:?}", fetcher.describe(), remote.last_incremental, plan);

    let mut chunks = Vec::new();
    if let TransferPlan::Incremental(range) = &plan {
        for n in range.clone() {
            let name = chunk_name(n);
            let path = cache_dir.join(&name);
            if same_chain && path.exists() {
                chunks.push(path);
                continue;
            }
            match download(fetcher, &name, &path, cancel) {
                Ok(_) => chunks.push(path),
                Err(IndexError::NotFound { url }) => {
                    tracing::info!("Incremental chunk {} unavailable, falling back to full transfer", url);
                    chunks.clear();
                    plan = TransferPlan::Full;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
    }

    let mut full = None;
    if plan == TransferPlan::Full {
        let path = cache_dir.join(FULL_CHUNK);
        let marker = cache_dir.join(FULL_CHUNK_STATE);
        let snapshot_of = RemoteIndexProperties::load(&marker).ok();
        if snapshot_of.as_ref() == Some(&remote) && path.exists() {
            tracing::debug!("Reusing cached snapshot of {}", fetcher.describe());
        } else {
            download(fetcher, FULL_CHUNK, &path, cancel)?;
            remote.store(&marker)?;
        }
        full = Some(path);
    }

    remote.store(&cached_path)?;

    Ok(FetchResult {
        remote,
        plan,
        full,
        chunks,
    })
}

fn download(fetcher: &dyn ResourceFetcher, name: &str, dest: &Path, cancel: &CancellationToken) -> Result<u64> {
    let part = dest.with_file_name(format!("{}.part", name));
    let result = (|| -> Result<u64> {
        let mut writer = BufWriter::new(File::create(&part)?);
        let bytes = fetcher.fetch(name, &mut writer, cancel)?;
        writer.flush()?;
        Ok(bytes)
    })();

    match result {
        Ok(bytes) => {
            fs::rename(&part, dest)?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

fn clear_chunks(cache_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(cache_dir)? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.ends_with(".gz") || name.ends_with(".part") || name == FULL_CHUNK_STATE {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
