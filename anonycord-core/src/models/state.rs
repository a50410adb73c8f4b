use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::artifact::RecordingKind;
use super::config::CaptureConfiguration;
use super::error::CaptureError;
use super::graph::Port;
use super::permissions::PermissionState;

/// Recording lifecycle state, tracked per kind.
///
/// State transitions:
/// ```text
/// idle → starting → recording → stopping → finalizing → idle
///           ↓           ↓           ↓           ↓
///           └───────────┴─── failed ┴───────────┘
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordingState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
    Finalizing,
    Failed(CaptureError),
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Whether a recording handle exists in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Recording | Self::Stopping | Self::Finalizing
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Read-only view of the live capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Identity of the session; changes only when a new session is built.
    pub id: Uuid,
    /// Bumped on every applied graph mutation.
    pub revision: u64,
    pub configuration: CaptureConfiguration,
    pub ports: Vec<Port>,
    pub running: bool,
}

/// The in-flight recording, as visible to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRecording {
    pub id: Uuid,
    pub kind: RecordingKind,
    pub started_at: DateTime<Utc>,
    pub output_target: PathBuf,
}

impl ActiveRecording {
    pub fn elapsed_secs(&self) -> f64 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// Poll-based status of the recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStatus {
    pub permissions: PermissionState,
    pub session: Option<SessionSnapshot>,
    pub video: RecordingState,
    pub audio: RecordingState,
    pub active_recording: Option<ActiveRecording>,
}

impl RecorderStatus {
    pub fn state(&self, kind: RecordingKind) -> &RecordingState {
        match kind {
            RecordingKind::Video => &self.video,
            RecordingKind::Audio => &self.audio,
        }
    }

    pub(crate) fn state_mut(&mut self, kind: RecordingKind) -> &mut RecordingState {
        match kind {
            RecordingKind::Video => &mut self.video,
            RecordingKind::Audio => &mut self.audio,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.video.is_active() || self.audio.is_active()
    }
}
