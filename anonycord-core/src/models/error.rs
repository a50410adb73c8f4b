use thiserror::Error;

use super::artifact::RecordingKind;
use super::permissions::Medium;

/// Errors surfaced by the capture-session controller.
///
/// None of them is fatal: after any failure the controller keeps accepting
/// commands from idle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied for {0}")]
    PermissionDenied(Medium),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("a recording is in progress")]
    BusyRecording,

    #[error("conflicting recording: {active} recording already active")]
    ConflictingRecording { active: RecordingKind },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("persist failed: {0}")]
    PersistFailed(String),

    #[error("settings storage error: {0}")]
    SettingsStorage(String),

    #[error("capture session not configured")]
    NotConfigured,

    #[error("recorder has been shut down")]
    ShutDown,
}

/// Failure reported by a media library backend.
///
/// Only `Transient` failures are retried by the persistence sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("library temporarily unavailable: {0}")]
    Transient(String),

    #[error("library rejected artifact: {0}")]
    Permanent(String),
}

impl LibraryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient(reason) | Self::Permanent(reason) => reason,
        }
    }
}
