//! Artidex - searchable indexes over artifact repositories
//!
//! Keeps one on-disk index per repository: the workspace, the local
//! artifact cache and any number of remote repositories whose published
//! indexes are downloaded incrementally. Indexes answer structured
//! coordinate lookups, free-text searches by type and checksum
//! identification, alone or merged into a composite view.

pub mod config;
pub mod details;
pub mod error;
pub mod handle;
pub mod indexer;
pub mod lock;
pub mod manager;
pub mod model;
pub mod properties;
pub mod query;
pub mod queue;
pub mod remote;
pub mod scanner;
pub mod version;
pub mod watcher;

pub use error::{IndexError, Result};
pub use handle::{ArtifactIndex, CompositeIndex, IndexHandle};
pub use manager::{IndexListener, IndexManager, ManagerConfig, RepositoryStatus, UpdateOutcome, WorkspaceProjects};
pub use model::{
    ArtifactKey, ArtifactRecord, ClassifierMask, IndexDetailLevel, IndexedArtifact, IndexedArtifactFile,
    RepositoryDescriptor, RepositoryScope, SearchExpression, SearchType,
};
pub use query::FindQuery;
pub use queue::{UpdateCommand, UpdateQueue, UpdateStatus};
pub use remote::IndexPacker;
