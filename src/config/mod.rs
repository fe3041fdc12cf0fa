//! Configuration loading for the `artidex` binary.
//!
//! Configuration lives in a TOML file (`~/.artidex/config.toml` unless
//! overridden). Every field has a default, so a missing file is a valid,
//! empty configuration.
//!
//! ```toml
//! [index]
//! dir = "~/.artidex/indexes"
//! local_repository = "~/.m2/repository"
//! local_details = "min"
//!
//! [http]
//! timeout_secs = 30
//!
//! [[repositories]]
//! id = "central"
//! url = "https://repo.maven.apache.org/maven2"
//! details = "min"
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::manager::ManagerConfig;
use crate::model::{IndexDetailLevel, RepositoryDescriptor};
use crate::remote::HttpSettings;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_local_repository")]
    pub local_repository: PathBuf,
    #[serde(default = "default_local_details")]
    pub local_details: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            local_repository: default_local_repository(),
            local_details: default_local_details(),
        }
    }
}

/// A remote repository whose index is downloaded
#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    pub id: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Initial detail level; a level set with `artidex details` takes over
    pub details: Option<String>,
}

impl RepositoryConfig {
    pub fn descriptor(&self) -> RepositoryDescriptor {
        let descriptor = RepositoryDescriptor::remote(&self.id, self.url.trim_end_matches('/'));
        match &self.username {
            Some(username) => descriptor.with_credentials(username, self.password.as_deref().unwrap_or_default()),
            None => descriptor,
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_index_dir() -> PathBuf {
    home().join(".artidex").join("indexes")
}

fn default_local_repository() -> PathBuf {
    home().join(".m2").join("repository")
}

fn default_local_details() -> String {
    "min".to_string()
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        home().join(".artidex").join("config.toml")
    }

    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.index.dir = expand_home(&config.index.dir);
        config.index.local_repository = expand_home(&config.index.local_repository);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).map_err(|e| IndexError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.index.local_details.parse::<IndexDetailLevel>()?;

        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.id.trim().is_empty() {
                return Err(IndexError::Config("repository id must not be empty".to_string()));
            }
            if repo.id == RepositoryDescriptor::LOCAL_UID || repo.id == RepositoryDescriptor::WORKSPACE_UID {
                return Err(IndexError::Config(format!("repository id `{}` is reserved", repo.id)));
            }
            if !seen.insert(repo.id.as_str()) {
                return Err(IndexError::Config(format!("duplicate repository id `{}`", repo.id)));
            }
            let scheme_ok = ["http://", "https://", "file://"].iter().any(|s| repo.url.starts_with(s));
            if !scheme_ok {
                return Err(IndexError::Config(format!(
                    "repository `{}` has unsupported url `{}`",
                    repo.id, repo.url
                )));
            }
            if let Some(details) = &repo.details {
                details.parse::<IndexDetailLevel>()?;
            }
        }
        Ok(())
    }

    pub fn local_repository(&self) -> RepositoryDescriptor {
        RepositoryDescriptor::local(&self.index.local_repository)
    }

    pub fn manager_config(&self) -> Result<ManagerConfig> {
        let mut levels = BTreeMap::new();
        levels.insert(
            RepositoryDescriptor::LOCAL_UID.to_string(),
            self.index.local_details.parse::<IndexDetailLevel>()?,
        );
        for repo in &self.repositories {
            if let Some(details) = &repo.details {
                levels.insert(repo.id.clone(), details.parse()?);
            }
        }

        let mut config = ManagerConfig::new(&self.index.dir);
        config.http = self.http.clone();
        config.levels = levels;
        Ok(config)
    }
}
