use crate::models::artifact::{Artifact, PersistResult, RecordingKind};
use crate::models::error::CaptureError;
use crate::models::permissions::PermissionState;
use crate::models::state::{RecordingState, SessionSnapshot};

/// Push notifications from the recorder.
///
/// Calls go through the recorder's `Dispatcher`; with the default inline
/// dispatcher they arrive on the session thread, not the UI thread.
/// Every method has an empty default so hosts implement only what they use.
pub trait RecorderDelegate: Send + Sync {
    fn on_permissions_changed(&self, _permissions: &PermissionState) {}

    /// Called after a session is built, mutated or torn down.
    fn on_session_changed(&self, _session: Option<&SessionSnapshot>) {}

    fn on_state_changed(&self, _kind: RecordingKind, _state: &RecordingState) {}

    /// Called once per recording when it ends, successfully or not.
    fn on_recording_finished(&self, _kind: RecordingKind, _result: &Result<Artifact, CaptureError>) {}

    /// Called once per persist request.
    fn on_persisted(&self, _result: &PersistResult) {}

    /// Failures with no other completion channel (photo capture, setup
    /// without a callback, max-duration stop).
    fn on_error(&self, _error: &CaptureError) {}
}
