//! Local repository scanner
//!
//! Walks a repository laid out as `group/path/artifactId/version/` and turns
//! each artifact file into an `ArtifactRecord`. Checksums come from sibling
//! `.sha1` files when present and are computed otherwise. At the full detail
//! level, plugin prefixes and jar class listings are collected as well.

mod pom;

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{IndexError, Result};
use crate::model::{ArtifactKey, ArtifactRecord, IndexDetailLevel};
use crate::query::PACKAGING_PLUGIN;
pub use pom::{read_pom, PomInfo};

/// Files that live next to artifacts but are not artifacts themselves
const IGNORED_EXTENSIONS: [&str; 7] = ["sha1", "md5", "asc", "lastUpdated", "repositories", "properties", "xml"];

/// Statistics from a scan
#[derive(Debug, Default)]
pub struct ScanStats {
    pub directories: usize,
    pub artifacts: usize,
    pub skipped: usize,
}

/// Scan `basedir` into records. Checks `cancel` once per version directory.
pub fn scan_repository(
    basedir: &Path,
    level: IndexDetailLevel,
    cancel: &CancellationToken,
) -> Result<(Vec<ArtifactRecord>, ScanStats)> {
    let mut stats = ScanStats::default();
    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    if !basedir.exists() {
        tracing::warn!("Repository directory {:?} does not exist", basedir);
        return Ok((Vec::new(), stats));
    }

    let walker = WalkDir::new(basedir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            by_dir
                .entry(parent.to_path_buf())
                .or_default()
                .push(entry.path().to_path_buf());
        }
    }

    let mut records = Vec::new();
    for (dir, files) in &by_dir {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let Some((group_id, artifact_id, version)) = coordinates(basedir, dir) else {
            stats.skipped += files.len();
            continue;
        };
        stats.directories += 1;
        let before = records.len();
        scan_version_dir(&group_id, &artifact_id, &version, files, level, &mut records);
        stats.artifacts += records.len() - before;
    }

    tracing::info!(
        "Scanned {:?}: {} artifacts in {} directories",
        basedir,
        stats.artifacts,
        stats.directories
    );
    Ok((records, stats))
}

/// `basedir/org/acme/lib/1.0` -> (`org.acme`, `lib`, `1.0`)
fn coordinates(basedir: &Path, dir: &Path) -> Option<(String, String, String)> {
    let relative = dir.strip_prefix(basedir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.len() < 3 {
        return None;
    }
    let version = parts[parts.len() - 1].clone();
    let artifact_id = parts[parts.len() - 2].clone();
    let group_id = parts[..parts.len() - 2].join(".");
    Some((group_id, artifact_id, version))
}

/// Split `lib-1.0-sources.jar` into (classifier, extension) for `lib`/`1.0`.
fn split_file_name(file_name: &str, artifact_id: &str, version: &str) -> Option<(Option<String>, String)> {
    let base = format!("{}-{}", artifact_id, version);
    let rest = file_name.strip_prefix(&base)?;
    if let Some(ext) = rest.strip_prefix('.') {
        return (!ext.is_empty()).then(|| (None, ext.to_string()));
    }
    let rest = rest.strip_prefix('-')?;
    let (classifier, ext) = rest.split_once('.')?;
    if classifier.is_empty() || ext.is_empty() {
        return None;
    }
    Some((Some(classifier.to_string()), ext.to_string()))
}

fn scan_version_dir(
    group_id: &str,
    artifact_id: &str,
    version: &str,
    files: &[PathBuf],
    level: IndexDetailLevel,
    records: &mut Vec<ArtifactRecord>,
) {
    let mut artifacts: Vec<(Option<String>, String, &PathBuf)> = Vec::new();
    for path in files {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((classifier, ext)) = split_file_name(file_name, artifact_id, version) else {
            continue;
        };
        if IGNORED_EXTENSIONS.iter().any(|ignored| ext.ends_with(ignored)) {
            continue;
        }
        artifacts.push((classifier, ext, path));
    }
    if artifacts.is_empty() {
        return;
    }

    let pom = artifacts
        .iter()
        .find(|(classifier, ext, _)| classifier.is_none() && ext == "pom")
        .and_then(|(_, _, path)| match read_pom(path) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!("Unreadable pom {:?}: {}", path, e);
                None
            }
        });
    let has_main = artifacts
        .iter()
        .any(|(classifier, ext, _)| classifier.is_none() && ext != "pom");
    let sources_exists = artifacts.iter().any(|(c, _, _)| c.as_deref() == Some("sources"));
    let javadoc_exists = artifacts.iter().any(|(c, _, _)| c.as_deref() == Some("javadoc"));

    let key = ArtifactKey::new(group_id, artifact_id, version);
    for (classifier, ext, path) in &artifacts {
        if classifier.is_none() && ext == "pom" && has_main {
            continue;
        }

        let mut record = match classifier {
            None => {
                let packaging = pom
                    .as_ref()
                    .and_then(|p| p.packaging.clone())
                    .unwrap_or_else(|| if ext == "pom" { "jar".to_string() } else { ext.clone() });
                let mut record = ArtifactRecord::new(&key, packaging, ext.clone());
                record.sources_exists = sources_exists;
                record.javadoc_exists = javadoc_exists;
                if let Some(info) = &pom {
                    record.name = info.name.clone();
                    record.description = info.description.clone();
                }
                record
            }
            Some(c) => ArtifactRecord::new(&key.clone().with_classifier(c.clone()), ext.clone(), ext.clone()),
        };

        if let Err(e) = fill_file_attributes(&mut record, path) {
            tracing::debug!("Skipping {:?}: {}", path, e);
            continue;
        }

        if level == IndexDetailLevel::Full && record.classifier.is_none() {
            if record.packaging == PACKAGING_PLUGIN {
                record.prefix = plugin_prefix(artifact_id);
            }
            if record.extension == "jar" {
                match list_classes(path) {
                    Ok(classes) => record.classnames = classes,
                    Err(e) => tracing::debug!("Cannot list classes of {:?}: {}", path, e),
                }
            }
        }

        records.push(record);
    }
}

/// Size, modification time, file name and checksum from disk.
pub fn fill_file_attributes(record: &mut ArtifactRecord, path: &Path) -> Result<()> {
    let metadata = fs::metadata(path)?;
    if let Some(name) = path.file_name() {
        record.file_name = name.to_string_lossy().to_string();
    }
    record.last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    if metadata.is_file() {
        record.size = metadata.len();
        record.sha1 = Some(match read_sha1_sidecar(path) {
            Some(sha1) => sha1,
            None => sha1_file(path)?,
        });
    }
    Ok(())
}

fn read_sha1_sidecar(path: &Path) -> Option<String> {
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".sha1");
    let content = fs::read_to_string(PathBuf::from(sidecar)).ok()?;
    let sha1: String = content.trim().chars().take(40).collect();
    (sha1.len() == 40 && sha1.chars().all(|c| c.is_ascii_hexdigit())).then(|| sha1.to_ascii_lowercase())
}

/// Hex-encoded SHA-1 of a file's content
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Default goal prefix of a plugin: `maven-X-plugin` / `X-maven-plugin` -> `X`.
pub fn plugin_prefix(artifact_id: &str) -> Option<String> {
    artifact_id
        .strip_prefix("maven-")
        .and_then(|rest| rest.strip_suffix("-plugin"))
        .or_else(|| artifact_id.strip_suffix("-maven-plugin"))
        .or_else(|| artifact_id.strip_suffix("-plugin"))
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}

/// Top-level classes of a jar, `/`-separated, without `.class`.
pub fn list_classes(path: &Path) -> Result<Vec<String>> {
    let archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut classes: Vec<String> = archive
        .file_names()
        .filter_map(|name| name.strip_suffix(".class"))
        .filter(|name| !name.contains('$') && !name.ends_with("module-info") && !name.ends_with("package-info"))
        .map(str::to_string)
        .collect();
    classes.sort();
    Ok(classes)
}

/// Whether a file below a repository directory can be an artifact: not
/// hidden, not a download in progress, not checksum or metadata.
pub fn is_artifact_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.ends_with(".part") {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => !IGNORED_EXTENSIONS.iter().any(|ignored| ext.ends_with(ignored)),
        None => false,
    }
}

/// Extension of an artifact file as indexed; a `pom.xml` counts as `pom`.
pub fn artifact_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("xml") => "pom".to_string(),
        Some(ext) => ext.to_string(),
        None => "jar".to_string(),
    }
}

/// Build the record for a single artifact file outside a repository layout,
/// e.g. a workspace project's pom or build output.
pub fn record_for_file(key: &ArtifactKey, path: &Path, level: IndexDetailLevel) -> Result<ArtifactRecord> {
    let ext = artifact_extension(path);
    let packaging = if ext == "pom" {
        read_pom(path)
            .ok()
            .and_then(|info| info.packaging)
            .unwrap_or_else(|| "jar".to_string())
    } else {
        ext.clone()
    };

    let mut record = ArtifactRecord::new(key, packaging, ext);
    if !path.exists() {
        return Ok(record);
    }
    fill_file_attributes(&mut record, path)?;

    if level == IndexDetailLevel::Full && record.extension == "jar" && path.is_file() {
        match list_classes(path) {
            Ok(classes) => record.classnames = classes,
            Err(e) => tracing::debug!("Cannot list classes of {:?}: {}", path, e),
        }
    }
    Ok(record)
}
