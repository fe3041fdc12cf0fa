//! Persisted index detail levels
//!
//! Maps repository uid -> detail level. Read once at startup and rewritten
//! whenever a repository's level changes. Stored as a properties file so it
//! stays hand-editable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::IndexDetailLevel;
use crate::properties::{self, Properties};

const FILE_NAME: &str = "index-details.properties";

/// Detail level per repository uid
#[derive(Debug, Default)]
pub struct IndexDetails {
    levels: BTreeMap<String, IndexDetailLevel>,
    path: PathBuf,
}

impl IndexDetails {
    /// Load from `index_dir` or start empty
    pub fn load(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(FILE_NAME);

        if !path.exists() {
            return Ok(Self {
                levels: BTreeMap::new(),
                path,
            });
        }

        let mut levels = BTreeMap::new();
        for (uid, value) in properties::load(&path)? {
            match value.parse::<IndexDetailLevel>() {
                Ok(level) => {
                    levels.insert(uid, level);
                }
                Err(e) => tracing::warn!("Ignoring index details for {}: {}", uid, e),
            }
        }

        Ok(Self { levels, path })
    }

    pub fn get(&self, uid: &str) -> Option<IndexDetailLevel> {
        self.levels.get(uid).copied()
    }

    /// Returns true if the stored value changed
    pub fn set(&mut self, uid: &str, level: IndexDetailLevel) -> bool {
        self.levels.insert(uid.to_string(), level) != Some(level)
    }

    pub fn remove(&mut self, uid: &str) -> bool {
        self.levels.remove(uid).is_some()
    }

    pub fn save(&self) -> Result<()> {
        let props: Properties = self
            .levels
            .iter()
            .map(|(uid, level)| (uid.clone(), level.as_str().to_string()))
            .collect();
        properties::store(&self.path, "repository uid = off | min | full", &props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();

        let mut details = IndexDetails::load(dir.path()).unwrap();
        assert!(details.get("central").is_none());
        assert!(details.set("central", IndexDetailLevel::Full));
        assert!(!details.set("central", IndexDetailLevel::Full));
        details.set("local", IndexDetailLevel::Disabled);
        details.save().unwrap();

        let reloaded = IndexDetails::load(dir.path()).unwrap();
        assert_eq!(reloaded.get("central"), Some(IndexDetailLevel::Full));
        assert_eq!(reloaded.get("local"), Some(IndexDetailLevel::Disabled));
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(FILE_NAME), "central=min\nother=verbose\n").unwrap();

        let details = IndexDetails::load(dir.path()).unwrap();
        assert_eq!(details.get("central"), Some(IndexDetailLevel::Min));
        assert!(details.get("other").is_none());
    }
}
