//! Scripted capture device for unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::artifact::{Artifact, RecordingKind};
use crate::models::capabilities::{DeviceCapabilities, VideoFormat};
use crate::models::config::{CaptureConfiguration, FrameRate, Lens, Resolution};
use crate::models::error::{CaptureError, LibraryError};
use crate::models::graph::Port;
use crate::models::permissions::{Authorization, Medium, PermissionState};
use crate::traits::capture_device::{AccessCallback, CaptureDevice, OutputEvents};
use crate::traits::media_library::{MediaLibrary, SavedAsset};

/// Wide and selfie lenses, 1080p and 4K at 30 fps, no 4K60.
pub(crate) fn phone_capabilities() -> DeviceCapabilities {
    let formats: BTreeSet<VideoFormat> = [
        (Resolution::Hd1080, FrameRate::Fps30),
        (Resolution::Uhd4k, FrameRate::Fps30),
    ]
    .into_iter()
    .map(|(resolution, frame_rate)| VideoFormat { resolution, frame_rate })
    .collect();

    DeviceCapabilities {
        lenses: BTreeMap::from([(Lens::Wide, formats.clone()), (Lens::Selfie, formats)]),
        has_microphone: true,
        supports_stereo: true,
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub capabilities: DeviceCapabilities,
    pub authorization: PermissionState,
    /// Answers given to prompts for undetermined media.
    pub answers: PermissionState,
    pub prompts: Vec<Medium>,
    pub attached: Vec<Port>,
    pub formats: HashMap<Lens, VideoFormat>,
    pub running: bool,
    pub commits: usize,
    pub mutations: usize,
    pub fail_attach: Option<Port>,
    pub fail_commit: bool,
    pub fail_output: Option<CaptureError>,
    pub fail_still: Option<CaptureError>,
    /// Leave outputs in `Starting` until `confirm_start`.
    pub manual_start: bool,
    pub outputs: HashMap<RecordingKind, OutputEvents>,
    pub stop_calls: usize,
}

/// Device half handed to the recorder; `FakeControl` keeps the other half.
pub(crate) struct FakeDevice {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Clone)]
pub(crate) struct FakeControl {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDevice {
    /// A device with both permissions granted.
    pub fn granted() -> (Self, FakeControl) {
        Self::with_authorization(PermissionState {
            camera: Authorization::Granted,
            microphone: Authorization::Granted,
        })
    }

    pub fn with_authorization(authorization: PermissionState) -> (Self, FakeControl) {
        let state = Arc::new(Mutex::new(FakeState {
            capabilities: phone_capabilities(),
            authorization,
            answers: PermissionState {
                camera: Authorization::Granted,
                microphone: Authorization::Granted,
            },
            ..FakeState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            FakeControl { state },
        )
    }
}

impl FakeControl {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Report the pending output of `kind` as live.
    pub fn confirm_start(&self, kind: RecordingKind) {
        let events = self.state.lock().outputs.get(&kind).cloned();
        if let Some(events) = events {
            events.started();
        }
    }

    /// Make the live output of `kind` fail mid-write.
    pub fn break_output(&self, kind: RecordingKind, error: CaptureError) {
        let events = self.state.lock().outputs.remove(&kind);
        if let Some(events) = events {
            events.finished(Err(error));
        }
    }
}

impl CaptureDevice for FakeDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.state.lock().capabilities.clone()
    }

    fn authorization_status(&self, medium: Medium) -> Authorization {
        self.state.lock().authorization.get(medium)
    }

    fn request_access(&mut self, medium: Medium, callback: AccessCallback) {
        let granted = {
            let mut state = self.state.lock();
            state.prompts.push(medium);
            let answer = state.answers.get(medium);
            *state.authorization.slot_mut(medium) = answer;
            answer.is_granted()
        };
        callback(granted);
    }

    fn begin_configuration(&mut self) {}

    fn commit_configuration(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fail_commit {
            return Err(CaptureError::Capture("commit refused".into()));
        }
        state.commits += 1;
        Ok(())
    }

    fn attach(&mut self, port: Port) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fail_attach == Some(port) {
            return Err(CaptureError::DeviceUnavailable(format!("{:?} busy", port)));
        }
        state.mutations += 1;
        state.attached.push(port);
        Ok(())
    }

    fn detach(&mut self, port: Port) {
        let mut state = self.state.lock();
        state.mutations += 1;
        state.attached.retain(|p| *p != port);
    }

    fn set_video_format(&mut self, lens: Lens, format: VideoFormat) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.mutations += 1;
        state.formats.insert(lens, format);
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        self.state.lock().running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.state.lock().running = false;
    }

    fn start_file_output(
        &mut self,
        kind: RecordingKind,
        target: &Path,
        _config: &CaptureConfiguration,
        events: OutputEvents,
    ) -> Result<(), CaptureError> {
        let manual = {
            let mut state = self.state.lock();
            if let Some(e) = state.fail_output.take() {
                return Err(e);
            }
            state.outputs.insert(kind, events.clone());
            state.manual_start
        };
        fs::write(target, b"fake media").map_err(|e| CaptureError::Capture(e.to_string()))?;
        if !manual {
            events.started();
        }
        Ok(())
    }

    fn stop_file_output(&mut self, kind: RecordingKind) -> Result<(), CaptureError> {
        let events = {
            let mut state = self.state.lock();
            state.stop_calls += 1;
            state.outputs.remove(&kind)
        };
        match events {
            Some(events) => {
                events.finished(Ok(()));
                Ok(())
            }
            None => Err(CaptureError::Capture(format!("no {} output running", kind))),
        }
    }

    fn capture_still(&mut self, target: &Path, _config: &CaptureConfiguration) -> Result<(), CaptureError> {
        if let Some(e) = self.state.lock().fail_still.take() {
            return Err(e);
        }
        fs::write(target, b"fake still").map_err(|e| CaptureError::Capture(e.to_string()))
    }
}

/// Library that records what it was given and answers from a script.
#[derive(Clone, Default)]
pub(crate) struct FakeLibrary {
    pub saved: Arc<Mutex<Vec<PathBuf>>>,
    pub script: Arc<Mutex<Vec<LibraryError>>>,
}

impl MediaLibrary for FakeLibrary {
    fn save(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError> {
        let scripted = {
            let mut script = self.script.lock();
            (!script.is_empty()).then(|| script.remove(0))
        };
        if let Some(e) = scripted {
            return Err(e);
        }
        self.saved.lock().push(artifact.path.clone());
        Ok(SavedAsset {
            location: artifact.path.clone(),
            checksum: "0".repeat(64),
        })
    }
}
