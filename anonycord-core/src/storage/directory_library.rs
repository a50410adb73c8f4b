use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::artifact::{Artifact, ArtifactKind};
use crate::models::error::LibraryError;
use crate::traits::media_library::{MediaLibrary, SavedAsset};

use super::metadata::{metadata_path, write_metadata, AssetMetadata};

/// Name of the marker file another process holds while it writes to the
/// library.
pub const LOCK_FILE_NAME: &str = ".library.lock";

/// Media library backed by a directory tree:
///
/// ```text
/// <root>/Videos/  <root>/Audio/  <root>/Photos/
/// ```
///
/// Every saved asset gets a `.metadata.json` sidecar with its SHA-256.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn album_dir(&self, kind: ArtifactKind) -> PathBuf {
        let album = match kind {
            ArtifactKind::Video => "Videos",
            ArtifactKind::Audio => "Audio",
            ArtifactKind::Photo => "Photos",
        };
        self.root.join(album)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    fn asset_name(artifact: &Artifact) -> String {
        format!(
            "{}_{}_{}.{}",
            artifact.kind,
            artifact.created_at.format("%Y%m%d_%H%M%S"),
            artifact.id.simple(),
            artifact.kind.extension()
        )
    }
}

impl MediaLibrary for DirectoryLibrary {
    fn save(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError> {
        if self.lock_path().exists() {
            return Err(LibraryError::Transient("library is locked".into()));
        }
        if !artifact.path.is_file() {
            return Err(LibraryError::Permanent(format!(
                "artifact missing from transient storage: {}",
                artifact.path.display()
            )));
        }

        let album = self.album_dir(artifact.kind);
        fs::create_dir_all(&album).map_err(|e| classify("create album", e))?;

        let location = album.join(Self::asset_name(artifact));
        if location.exists() {
            return Err(LibraryError::Permanent(format!(
                "asset already exists: {}",
                location.display()
            )));
        }

        // Copy under a temporary name so a half-written asset never shows up.
        let partial = location.with_extension("partial");
        fs::copy(&artifact.path, &partial).map_err(|e| {
            let _ = fs::remove_file(&partial);
            classify("copy artifact", e)
        })?;
        fs::rename(&partial, &location).map_err(|e| {
            let _ = fs::remove_file(&partial);
            classify("move artifact into album", e)
        })?;

        let saved = sha256_file(&location).and_then(|checksum| {
            let byte_size = fs::metadata(&location).map(|m| m.len()).unwrap_or(0);
            write_metadata(&AssetMetadata::new(artifact, &location, &checksum, byte_size), &location)?;
            Ok(checksum)
        });
        let checksum = match saved {
            Ok(checksum) => checksum,
            Err(e) => {
                let _ = fs::remove_file(&location);
                let _ = fs::remove_file(metadata_path(&location));
                return Err(e);
            }
        };

        if let Err(e) = fs::remove_file(&artifact.path) {
            log::warn!("saved {} but could not remove transient file: {}", artifact.id, e);
        }

        Ok(SavedAsset { location, checksum })
    }
}

fn classify(action: &str, e: io::Error) -> LibraryError {
    let reason = format!("failed to {}: {}", action, e);
    match e.kind() {
        io::ErrorKind::WouldBlock
        | io::ErrorKind::Interrupted
        | io::ErrorKind::TimedOut
        | io::ErrorKind::ResourceBusy => LibraryError::Transient(reason),
        _ => LibraryError::Permanent(reason),
    }
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, LibraryError> {
    let data = fs::read(path)
        .map_err(|e| LibraryError::Permanent(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
