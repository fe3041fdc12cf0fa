//! Repository descriptors and per-repository indexing policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::IndexError;

/// Where a repository comes from. Decides which update path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryScope {
    /// In-memory projects of the current workspace
    Workspace,
    /// The local artifact cache on disk
    Local,
    /// A remote repository declared in user settings
    Settings,
    /// A remote repository discovered some other way
    Unknown,
}

impl RepositoryScope {
    pub fn is_remote(self) -> bool {
        matches!(self, RepositoryScope::Settings | RepositoryScope::Unknown)
    }
}

/// Basic-auth credentials for a remote repository.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An indexable artifact source.
///
/// `uid` is the lookup and lock key for the repository's whole lifetime; two
/// descriptors with the same uid always refer to the same index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub uid: String,
    pub url: String,
    pub basedir: Option<PathBuf>,
    pub scope: RepositoryScope,
    pub credentials: Option<Credentials>,
}

impl RepositoryDescriptor {
    pub const WORKSPACE_UID: &'static str = "workspace";
    pub const LOCAL_UID: &'static str = "local";

    pub fn workspace() -> Self {
        Self {
            uid: Self::WORKSPACE_UID.to_string(),
            url: "workspace://".to_string(),
            basedir: None,
            scope: RepositoryScope::Workspace,
            credentials: None,
        }
    }

    pub fn local(basedir: impl Into<PathBuf>) -> Self {
        let basedir = basedir.into();
        Self {
            uid: Self::LOCAL_UID.to_string(),
            url: format!("file://{}", basedir.display()),
            basedir: Some(basedir),
            scope: RepositoryScope::Local,
            credentials: None,
        }
    }

    pub fn remote(uid: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            url: url.into(),
            basedir: None,
            scope: RepositoryScope::Settings,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_scope(mut self, scope: RepositoryScope) -> Self {
        self.scope = scope;
        self
    }
}

/// How much metadata is indexed for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDetailLevel {
    /// No index context exists
    Disabled,
    /// Identity, checksum and file attributes
    #[default]
    Min,
    /// Everything in `Min` plus plugin prefix, goals and class names
    Full,
}

impl IndexDetailLevel {
    pub fn is_enabled(self) -> bool {
        self != IndexDetailLevel::Disabled
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexDetailLevel::Disabled => "off",
            IndexDetailLevel::Min => "min",
            IndexDetailLevel::Full => "full",
        }
    }
}

impl fmt::Display for IndexDetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexDetailLevel {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "disabled" => Ok(IndexDetailLevel::Disabled),
            "min" => Ok(IndexDetailLevel::Min),
            "full" => Ok(IndexDetailLevel::Full),
            other => Err(IndexError::Config(format!("unknown index detail level `{other}`"))),
        }
    }
}
