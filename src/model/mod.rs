//! Data model shared by the index, the query layer and callers

mod artifact;
mod repository;
mod search;

pub use artifact::{fold_artifacts, ArtifactKey, ArtifactRecord, IndexedArtifact, IndexedArtifactFile, NOT_AVAILABLE};
pub use repository::{Credentials, IndexDetailLevel, RepositoryDescriptor, RepositoryScope};
pub use search::{ClassifierMask, MatchKind, SearchExpression, SearchType};
