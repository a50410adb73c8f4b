use std::path::PathBuf;

use crate::models::artifact::Artifact;
use crate::models::error::LibraryError;

/// Where a persisted artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAsset {
    pub location: PathBuf,
    pub checksum: String,
}

/// The user's permanent media library.
///
/// On success the library owns the artifact and may have consumed the
/// transient file. On error the transient file must be left untouched.
pub trait MediaLibrary: Send {
    fn save(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError>;
}
