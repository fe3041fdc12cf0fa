//! Artifact identities, persisted records and query results

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::IndexDetailLevel;
use crate::error::IndexError;
use crate::version::compare_versions;

/// Placeholder for a missing classifier inside a `uinfo` key.
pub const NOT_AVAILABLE: &str = "NA";

/// Coordinates of one artifact: `groupId:artifactId:version[:classifier]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl ArtifactKey {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}

impl FromStr for ArtifactKey {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [g, a, v] if !g.is_empty() && !a.is_empty() && !v.is_empty() => Ok(ArtifactKey::new(*g, *a, *v)),
            [g, a, v, c] if !g.is_empty() && !a.is_empty() && !v.is_empty() => {
                Ok(ArtifactKey::new(*g, *a, *v).with_classifier(*c))
            }
            _ => Err(IndexError::Config(format!(
                "`{s}` is not groupId:artifactId:version[:classifier]"
            ))),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_extension() -> String {
    "jar".to_string()
}

/// One persisted index entry. Also the line format of remote index chunks,
/// where `deleted` marks a removal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    pub packaging: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size: u64,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub last_modified: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub sources_exists: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub javadoc_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,
    /// Fully qualified class names, `/`-separated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classnames: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl ArtifactRecord {
    pub fn new(key: &ArtifactKey, packaging: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let file_name = match &key.classifier {
            Some(c) => format!("{}-{}-{}.{}", key.artifact_id, key.version, c, extension),
            None => format!("{}-{}.{}", key.artifact_id, key.version, extension),
        };
        Self {
            group_id: key.group_id.clone(),
            artifact_id: key.artifact_id.clone(),
            version: key.version.clone(),
            classifier: key.classifier.clone(),
            packaging: packaging.into(),
            extension,
            file_name,
            ..Default::default()
        }
    }

    /// Removal marker for the record identified by `uinfo` of `self`.
    pub fn tombstone(&self) -> Self {
        Self {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            classifier: self.classifier.clone(),
            packaging: self.packaging.clone(),
            extension: self.extension.clone(),
            deleted: true,
            ..Default::default()
        }
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            classifier: self.classifier.clone(),
        }
    }

    /// Unique document key: `groupId|artifactId|version|classifier|extension`.
    pub fn uinfo(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.group_id,
            self.artifact_id,
            self.version,
            self.classifier.as_deref().unwrap_or(NOT_AVAILABLE),
            self.extension
        )
    }

    /// Drop the attributes that `level` does not index.
    pub fn for_level(mut self, level: IndexDetailLevel) -> Self {
        if level != IndexDetailLevel::Full {
            self.prefix = None;
            self.goals.clear();
            self.classnames.clear();
        }
        self
    }
}

/// One physical artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexedArtifactFile {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub classifier: Option<String>,
    pub file_name: String,
    pub size: u64,
    pub last_modified: u64,
    pub sha1: Option<String>,
    pub sources_exists: bool,
    pub javadoc_exists: bool,
    pub prefix: Option<String>,
    pub goals: Vec<String>,
}

impl IndexedArtifactFile {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

impl From<&ArtifactRecord> for IndexedArtifactFile {
    fn from(record: &ArtifactRecord) -> Self {
        Self {
            group_id: record.group_id.clone(),
            artifact_id: record.artifact_id.clone(),
            version: record.version.clone(),
            packaging: record.packaging.clone(),
            classifier: record.classifier.clone(),
            file_name: record.file_name.clone(),
            size: record.size,
            last_modified: record.last_modified,
            sha1: record.sha1.clone(),
            sources_exists: record.sources_exists,
            javadoc_exists: record.javadoc_exists,
            prefix: record.prefix.clone(),
            goals: record.goals.clone(),
        }
    }
}

impl PartialOrd for IndexedArtifactFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest version first; remaining attributes only break ties.
impl Ord for IndexedArtifactFile {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&other.version, &self.version)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.classifier.cmp(&other.classifier))
            .then_with(|| self.file_name.cmp(&other.file_name))
            .then_with(|| self.group_id.cmp(&other.group_id))
            .then_with(|| self.artifact_id.cmp(&other.artifact_id))
            .then_with(|| self.packaging.cmp(&other.packaging))
            .then_with(|| self.size.cmp(&other.size))
            .then_with(|| self.last_modified.cmp(&other.last_modified))
            .then_with(|| self.sha1.cmp(&other.sha1))
            .then_with(|| self.sources_exists.cmp(&other.sources_exists))
            .then_with(|| self.javadoc_exists.cmp(&other.javadoc_exists))
            .then_with(|| self.prefix.cmp(&other.prefix))
            .then_with(|| self.goals.cmp(&other.goals))
    }
}

/// A group/artifact identity aggregated over all of its files.
///
/// Equality and ordering look at the identity only, never at `files`, so
/// results from several indexes fold into one entry per identity.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub packaging: String,
    pub classname: Option<String>,
    pub package_name: Option<String>,
    pub files: BTreeSet<IndexedArtifactFile>,
}

impl IndexedArtifact {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>, packaging: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            packaging: packaging.into(),
            classname: None,
            package_name: None,
            files: BTreeSet::new(),
        }
    }

    pub fn with_class(mut self, classname: impl Into<String>, package_name: impl Into<String>) -> Self {
        self.classname = Some(classname.into());
        self.package_name = Some(package_name.into());
        self
    }

    /// `classname:packageName:groupId:artifactId`, the key of search result maps.
    pub fn search_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.classname.as_deref().unwrap_or(""),
            self.package_name.as_deref().unwrap_or(""),
            self.group_id,
            self.artifact_id
        )
    }

    pub fn add_file(&mut self, file: IndexedArtifactFile) {
        self.files.insert(file);
    }

    pub fn merge(&mut self, other: IndexedArtifact) {
        self.files.extend(other.files);
    }

    /// Versions of all files, newest first, without duplicates.
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        for file in &self.files {
            if !versions.contains(&file.version) {
                versions.push(file.version.clone());
            }
        }
        versions
    }

    /// Single-file artifact for one index record
    pub fn from_record(record: &ArtifactRecord) -> Self {
        let mut artifact = Self::new(&record.group_id, &record.artifact_id, &record.packaging);
        artifact.add_file(IndexedArtifactFile::from(record));
        artifact
    }

    fn identity(&self) -> (&str, &str, &str, Option<&str>, Option<&str>) {
        (
            &self.group_id,
            &self.artifact_id,
            &self.packaging,
            self.classname.as_deref(),
            self.package_name.as_deref(),
        )
    }
}

/// Merge artifacts with the same identity and return them in identity order.
pub fn fold_artifacts(artifacts: impl IntoIterator<Item = IndexedArtifact>) -> Vec<IndexedArtifact> {
    let mut folded: BTreeSet<IndexedArtifact> = BTreeSet::new();
    for artifact in artifacts {
        match folded.take(&artifact) {
            Some(mut existing) => {
                existing.merge(artifact);
                folded.insert(existing);
            }
            None => {
                folded.insert(artifact);
            }
        }
    }
    folded.into_iter().collect()
}

impl PartialEq for IndexedArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for IndexedArtifact {}

impl PartialOrd for IndexedArtifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexedArtifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(version: &str) -> IndexedArtifactFile {
        let key = ArtifactKey::new("com.acme", "lib", version);
        IndexedArtifactFile::from(&ArtifactRecord::new(&key, "jar", "jar"))
    }

    #[test]
    fn test_files_sorted_newest_first() {
        let mut artifact = IndexedArtifact::new("com.acme", "lib", "jar");
        artifact.add_file(file("1.0"));
        artifact.add_file(file("2.0-SNAPSHOT"));
        artifact.add_file(file("1.10"));
        assert_eq!(artifact.versions(), vec!["2.0-SNAPSHOT", "1.10", "1.0"]);
    }

    #[test]
    fn test_merge_unions_files_under_one_identity() {
        let mut a = IndexedArtifact::new("com.acme", "lib", "jar");
        a.add_file(file("1.0"));
        let mut b = IndexedArtifact::new("com.acme", "lib", "jar");
        b.add_file(file("1.0"));
        b.add_file(file("1.1"));

        assert_eq!(a, b);
        a.merge(b);
        assert_eq!(a.files.len(), 2);
    }

    #[test]
    fn test_fold_sorts_by_identity() {
        let lib = ArtifactRecord::new(&ArtifactKey::new("com.acme", "lib", "1.0"), "jar", "jar");
        let lib2 = ArtifactRecord::new(&ArtifactKey::new("com.acme", "lib", "2.0"), "jar", "jar");
        let api = ArtifactRecord::new(&ArtifactKey::new("com.acme", "api", "1.0"), "jar", "jar");

        let folded = fold_artifacts([&lib, &api, &lib2].into_iter().map(IndexedArtifact::from_record));
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].artifact_id, "api");
        assert_eq!(folded[1].versions(), vec!["2.0", "1.0"]);
    }

    #[test]
    fn test_record_naming() {
        let key = ArtifactKey::new("com.acme", "lib", "1.0").with_classifier("sources");
        let record = ArtifactRecord::new(&key, "jar", "jar");
        assert_eq!(record.file_name, "lib-1.0-sources.jar");
        assert_eq!(record.uinfo(), "com.acme|lib|1.0|sources|jar");

        let main = ArtifactRecord::new(&ArtifactKey::new("com.acme", "lib", "1.0"), "jar", "jar");
        assert_eq!(main.uinfo(), "com.acme|lib|1.0|NA|jar");
        assert!(main.tombstone().deleted);
    }

    #[test]
    fn test_min_level_strips_full_attributes() {
        let mut record = ArtifactRecord::new(&ArtifactKey::new("org.apache", "maven-x-plugin", "1"), "maven-plugin", "jar");
        record.prefix = Some("x".to_string());
        record.goals = vec!["run".to_string()];
        record.classnames = vec!["org/apache/X".to_string()];

        let min = record.clone().for_level(IndexDetailLevel::Min);
        assert!(min.prefix.is_none() && min.goals.is_empty() && min.classnames.is_empty());

        let full = record.for_level(IndexDetailLevel::Full);
        assert_eq!(full.goals, vec!["run"]);
    }

    #[test]
    fn test_parse_artifact_key() {
        let key: ArtifactKey = "com.acme:lib:1.0:tests".parse().unwrap();
        assert_eq!(key.classifier.as_deref(), Some("tests"));
        assert_eq!(key.to_string(), "com.acme:lib:1.0:tests");
        assert!("com.acme:lib".parse::<ArtifactKey>().is_err());
    }

    #[test]
    fn test_chunk_line_format_defaults() {
        let record: ArtifactRecord =
            serde_json::from_str(r#"{"group_id":"g","artifact_id":"a","version":"1","packaging":"pom"}"#).unwrap();
        assert_eq!(record.extension, "jar");
        assert!(!record.deleted);
    }
}
