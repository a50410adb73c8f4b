use std::fmt;
use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::models::artifact::RecordingKind;
use crate::models::capabilities::{DeviceCapabilities, VideoFormat};
use crate::models::config::{CaptureConfiguration, Lens};
use crate::models::error::CaptureError;
use crate::models::graph::Port;
use crate::models::permissions::{Authorization, Medium};

/// Invoked by the platform once the user answers an access prompt.
/// May fire on any thread.
pub type AccessCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Signal from a file output back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSignal {
    /// The output accepted the first buffer; the recording is live.
    Started,
    /// The output flushed its last buffer, or gave up with an error.
    Finished(Result<(), CaptureError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub recording_id: Uuid,
    pub kind: RecordingKind,
    pub signal: OutputSignal,
}

/// Handle a file output uses to report progress for one recording.
///
/// Events are queued onto the controller's session context, so they may be
/// posted from any thread, including from inside `start_file_output`.
#[derive(Clone)]
pub struct OutputEvents {
    recording_id: Uuid,
    kind: RecordingKind,
    post: Arc<dyn Fn(OutputEvent) + Send + Sync>,
}

impl OutputEvents {
    pub fn new(
        recording_id: Uuid,
        kind: RecordingKind,
        post: Arc<dyn Fn(OutputEvent) + Send + Sync>,
    ) -> Self {
        Self {
            recording_id,
            kind,
            post,
        }
    }

    pub fn recording_id(&self) -> Uuid {
        self.recording_id
    }

    pub fn kind(&self) -> RecordingKind {
        self.kind
    }

    pub fn started(&self) {
        self.send(OutputSignal::Started);
    }

    pub fn finished(&self, result: Result<(), CaptureError>) {
        self.send(OutputSignal::Finished(result));
    }

    fn send(&self, signal: OutputSignal) {
        (self.post)(OutputEvent {
            recording_id: self.recording_id,
            kind: self.kind,
            signal,
        });
    }
}

impl fmt::Debug for OutputEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputEvents")
            .field("recording_id", &self.recording_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The physical camera + microphone.
///
/// Implemented by platform backends and by `anonycord-sim`. Every method
/// except the access callback is called from the controller's single
/// session thread, so implementations may block.
pub trait CaptureDevice: Send {
    /// Pure capability probe.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Current authorization without prompting.
    fn authorization_status(&self, medium: Medium) -> Authorization;

    /// Prompt for access. `callback` must be invoked exactly once.
    fn request_access(&mut self, medium: Medium, callback: AccessCallback);

    /// Batch the following graph mutations.
    fn begin_configuration(&mut self);

    /// Apply the batched mutations atomically.
    fn commit_configuration(&mut self) -> Result<(), CaptureError>;

    fn attach(&mut self, port: Port) -> Result<(), CaptureError>;

    fn detach(&mut self, port: Port);

    /// Switch the active format of an attached camera in place.
    fn set_video_format(&mut self, lens: Lens, format: VideoFormat) -> Result<(), CaptureError>;

    fn start_running(&mut self) -> Result<(), CaptureError>;

    fn stop_running(&mut self);

    /// Begin writing `kind` to `target`. Progress is reported through
    /// `events`: `started` once live, then exactly one `finished`.
    fn start_file_output(
        &mut self,
        kind: RecordingKind,
        target: &Path,
        config: &CaptureConfiguration,
        events: OutputEvents,
    ) -> Result<(), CaptureError>;

    /// Ask the output to flush and close. Completion arrives as `finished`.
    fn stop_file_output(&mut self, kind: RecordingKind) -> Result<(), CaptureError>;

    /// Capture one still image into `target`.
    fn capture_still(&mut self, target: &Path, config: &CaptureConfiguration) -> Result<(), CaptureError>;
}
