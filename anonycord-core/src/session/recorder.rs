use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::artifact::{Artifact, PersistResult, RecordingKind};
use crate::models::capabilities::DeviceCapabilities;
use crate::models::config::{CaptureConfiguration, Lens};
use crate::models::error::CaptureError;
use crate::models::permissions::{Medium, PermissionState};
use crate::models::settings::RecorderSettings;
use crate::models::state::{RecorderStatus, SessionSnapshot};
use crate::storage::persistence::PersistenceSink;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::dispatcher::Dispatcher;
use crate::traits::media_library::MediaLibrary;
use crate::traits::recorder_delegate::RecorderDelegate;

use super::controller::{submit_persist, PersistCompletion, SessionCompletion, SessionCore, SessionCoreParts};
use super::lifecycle::{required_media, Completion};
use super::notifier::Notifier;
use super::permission_gate::PermissionGate;
use super::queue::SerialQueue;

/// The capture-session controller.
///
/// Owns the capture device on a dedicated session thread and the media
/// library on a persistence thread. Every method returns immediately;
/// outcomes arrive through completions, the delegate, or `status()`.
///
/// Completions and delegate calls go through the configured `Dispatcher`.
/// With the default `InlineDispatcher` they run on the worker threads, so
/// they must not call `sync()` or `shutdown()`.
pub struct MediaRecorder {
    session: SerialQueue<SessionCore>,
    persistence: SerialQueue<PersistenceSink>,
    gate: PermissionGate,
    status: Arc<Mutex<RecorderStatus>>,
    notifier: Notifier,
    capabilities: DeviceCapabilities,
}

impl MediaRecorder {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        library: Box<dyn MediaLibrary>,
        settings: RecorderSettings,
    ) -> Result<Self, CaptureError> {
        settings.validate()?;

        let capabilities = device.capabilities();
        let permissions = PermissionState {
            camera: device.authorization_status(Medium::Camera),
            microphone: device.authorization_status(Medium::Microphone),
        };
        let gate = PermissionGate::new(permissions);
        let status = Arc::new(Mutex::new(RecorderStatus {
            permissions,
            ..RecorderStatus::default()
        }));
        let notifier = Notifier::new();

        let sink_settings = settings.clone();
        let persistence = SerialQueue::spawn("anonycord-persistence", move |_| {
            PersistenceSink::new(library, &sink_settings)
        })?;

        let parts = SessionCoreParts {
            device,
            capabilities: capabilities.clone(),
            gate: gate.clone(),
            status: Arc::clone(&status),
            notifier: notifier.clone(),
            persistence: persistence.sender(),
            settings,
        };
        let session = SerialQueue::spawn("anonycord-session", move |queue| SessionCore::new(parts, queue))?;

        log::info!(
            "media recorder ready: lenses {:?}, microphone {}",
            capabilities.available_lenses(),
            capabilities.has_microphone
        );

        Ok(Self {
            session,
            persistence,
            gate,
            status,
            notifier,
            capabilities,
        })
    }

    // --- Permissions ---

    /// Prompt for any medium still undetermined. Answers show up in
    /// `permissions()` and `on_permissions_changed`; commands submitted
    /// after this one wait for the answer.
    pub fn request_permissions(&self) -> Result<(), CaptureError> {
        self.submit(|core| core.request_permissions())
    }

    pub fn check_authorized(&self, medium: Medium) -> bool {
        self.gate.is_authorized(medium)
    }

    pub fn permissions(&self) -> PermissionState {
        self.gate.snapshot()
    }

    // --- Capabilities ---

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn has_capability(&self, lens: Lens) -> bool {
        self.capabilities.has_lens(lens)
    }

    /// Whether `config` could be set up on this device.
    pub fn check_configuration(&self, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        config.validate()?;
        self.capabilities.check(config)
    }

    // --- Session ---

    /// Build the capture graph for `config`, replacing any existing one.
    ///
    /// An invalid or unsupported configuration is rejected here and `done`
    /// is not called. Otherwise `done` receives the new session.
    pub fn setup_capture_session(
        &self,
        config: CaptureConfiguration,
        done: impl FnOnce(Result<SessionSnapshot, CaptureError>) + Send + 'static,
    ) -> Result<(), CaptureError> {
        self.precheck_session(&config)?;
        let done: SessionCompletion = Box::new(done);
        self.submit(move |core| core.setup(config, Some(done)))
    }

    /// Move the live graph to `config`, touching only the ports that differ.
    /// Same rejection rules as `setup_capture_session`.
    pub fn reconfigure_capture_session(
        &self,
        config: CaptureConfiguration,
        done: impl FnOnce(Result<SessionSnapshot, CaptureError>) + Send + 'static,
    ) -> Result<(), CaptureError> {
        self.precheck_session(&config)?;
        let done: SessionCompletion = Box::new(done);
        self.submit(move |core| core.reconfigure(config, Some(done)))
    }

    /// Release the graph. `done` receives the last session.
    pub fn teardown_capture_session(
        &self,
        done: impl FnOnce(Result<SessionSnapshot, CaptureError>) + Send + 'static,
    ) -> Result<(), CaptureError> {
        let done: SessionCompletion = Box::new(done);
        self.submit(move |core| core.teardown(Some(done)))
    }

    fn precheck_session(&self, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        self.check_configuration(config)?;
        let permissions = self.gate.snapshot();
        if permissions.is_resolved() && !permissions.camera.is_granted() && !permissions.microphone.is_granted() {
            return Err(CaptureError::PermissionDenied(Medium::Camera));
        }
        Ok(())
    }

    // --- Recording ---

    /// Start a video recording. `completion` fires exactly once: with the
    /// artifact, or with the error that ended the attempt. It fires even
    /// when this call returns `Err`.
    pub fn start_video_recording(
        &self,
        completion: impl FnOnce(Result<Artifact, CaptureError>) + Send + 'static,
    ) -> Result<(), CaptureError> {
        let completion = Completion::new(Box::new(completion), self.notifier.clone());
        if let Err(e) = self.require(RecordingKind::Video) {
            completion.complete(Err(e.clone()));
            return Err(e);
        }
        self.submit(move |core| core.start_recording(RecordingKind::Video, Some(completion)))
    }

    /// No-op unless a video recording is live or starting.
    pub fn stop_video_recording(&self) {
        self.stop(RecordingKind::Video);
    }

    /// Start an audio recording. The result is observable through
    /// `status()` and `on_recording_finished`.
    pub fn start_audio_recording(&self) -> Result<(), CaptureError> {
        self.require(RecordingKind::Audio)?;
        self.submit(|core| core.start_recording(RecordingKind::Audio, None))
    }

    pub fn stop_audio_recording(&self) {
        self.stop(RecordingKind::Audio);
    }

    /// Capture a still and hand it to the persistence sink. Failures are
    /// reported through `on_error`.
    pub fn take_photo(&self) -> Result<(), CaptureError> {
        self.gate.require(Medium::Camera)?;
        self.submit(|core| core.take_photo())
    }

    fn require(&self, kind: RecordingKind) -> Result<(), CaptureError> {
        required_media(kind).iter().try_for_each(|m| self.gate.require(*m))
    }

    fn stop(&self, kind: RecordingKind) {
        if self.submit(move |core| core.stop_recording(kind)).is_err() {
            log::debug!("stop {} after shutdown ignored", kind);
        }
    }

    // --- Persistence ---

    /// Persist `artifact` again, typically after a failed automatic
    /// attempt. `done` receives the result instead of the delegate.
    pub fn persist(
        &self,
        artifact: Artifact,
        done: impl FnOnce(PersistResult) + Send + 'static,
    ) -> Result<(), CaptureError> {
        let done: PersistCompletion = Box::new(done);
        if submit_persist(&self.persistence.sender(), &self.notifier, artifact, Some(done)) {
            Ok(())
        } else {
            Err(CaptureError::ShutDown)
        }
    }

    // --- Observation ---

    pub fn status(&self) -> RecorderStatus {
        self.status.lock().clone()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RecorderDelegate>) {
        self.notifier.set_delegate(Some(delegate));
    }

    pub fn clear_delegate(&self) {
        self.notifier.set_delegate(None);
    }

    pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.notifier.set_dispatcher(dispatcher);
    }

    /// Block until every command submitted so far, and any work it queued
    /// (output events, persistence), has run.
    pub fn sync(&self) -> Result<(), CaptureError> {
        loop {
            self.session.run_sync(|_| ())?;
            self.persistence.run_sync(|_| ())?;
            if self.session.pending() == 0 && self.persistence.pending() == 0 {
                return Ok(());
            }
        }
    }

    /// Fail any active recording with `ShutDown`, release the session and
    /// join both workers. Later commands fail with `ShutDown`.
    pub fn shutdown(&mut self) {
        if self.session.run_sync(|core| core.shut_down()).is_ok() {
            log::info!("media recorder shut down");
        }
        self.session.shutdown();
        self.persistence.shutdown();
    }

    fn submit(&self, job: impl FnOnce(&mut SessionCore) + Send + 'static) -> Result<(), CaptureError> {
        if self.session.submit(Box::new(job)) {
            Ok(())
        } else {
            Err(CaptureError::ShutDown)
        }
    }
}

impl Drop for MediaRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
