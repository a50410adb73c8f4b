use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::CaptureConfiguration;

/// Kind of a stateful recording. Video and audio are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingKind {
    Video,
    Audio,
}

impl fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Audio,
    Photo,
}

impl ArtifactKind {
    /// File extension used for transient files of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video => "y4m",
            Self::Audio => "wav",
            Self::Photo => "png",
        }
    }
}

impl From<RecordingKind> for ArtifactKind {
    fn from(kind: RecordingKind) -> Self {
        match kind {
            RecordingKind::Video => Self::Video,
            RecordingKind::Audio => Self::Audio,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
            Self::Photo => f.write_str("photo"),
        }
    }
}

/// A finalized media file sitting on transient storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Recorded length; `None` for stills.
    pub duration_secs: Option<f64>,
    /// Configuration the artifact was captured with.
    pub configuration: CaptureConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved { location: PathBuf, checksum: String },
    Failed(String),
}

/// Outcome of committing one artifact to the media library.
///
/// On failure `artifact.path` still points at the transient file.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistResult {
    pub outcome: PersistOutcome,
    pub artifact_kind: ArtifactKind,
    pub artifact: Artifact,
}

impl PersistResult {
    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, PersistOutcome::Saved { .. })
    }
}
