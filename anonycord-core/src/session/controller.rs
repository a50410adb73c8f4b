use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::artifact::{Artifact, ArtifactKind, PersistResult, RecordingKind};
use crate::models::capabilities::DeviceCapabilities;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::graph::{GraphInputs, Port};
use crate::models::permissions::Medium;
use crate::models::settings::RecorderSettings;
use crate::models::state::{RecorderStatus, RecordingState, SessionSnapshot};
use crate::storage::persistence::PersistenceSink;
use crate::traits::capture_device::{CaptureDevice, OutputEvent, OutputEvents, OutputSignal};

use super::builder::SessionBuilder;
use super::lifecycle::{output_port, required_media, Completion, RecordingHandle};
use super::notifier::Notifier;
use super::permission_gate::PermissionGate;
use super::queue::QueueSender;

pub(crate) type SessionCompletion = Box<dyn FnOnce(Result<SessionSnapshot, CaptureError>) + Send + 'static>;
pub(crate) type PersistCompletion = Box<dyn FnOnce(PersistResult) + Send + 'static>;

/// Everything owned by the session queue: the device, the graph and the
/// recording handle. Only ever touched from the session thread.
pub(crate) struct SessionCore {
    device: Box<dyn CaptureDevice>,
    capabilities: DeviceCapabilities,
    builder: SessionBuilder,
    recording: Option<RecordingHandle>,
    gate: PermissionGate,
    status: Arc<Mutex<RecorderStatus>>,
    notifier: Notifier,
    persistence: QueueSender<PersistenceSink>,
    settings: RecorderSettings,
    queue: QueueSender<SessionCore>,
}

pub(crate) struct SessionCoreParts {
    pub device: Box<dyn CaptureDevice>,
    pub capabilities: DeviceCapabilities,
    pub gate: PermissionGate,
    pub status: Arc<Mutex<RecorderStatus>>,
    pub notifier: Notifier,
    pub persistence: QueueSender<PersistenceSink>,
    pub settings: RecorderSettings,
}

impl SessionCore {
    pub fn new(parts: SessionCoreParts, queue: QueueSender<SessionCore>) -> Self {
        Self {
            device: parts.device,
            capabilities: parts.capabilities,
            builder: SessionBuilder::default(),
            recording: None,
            gate: parts.gate,
            status: parts.status,
            notifier: parts.notifier,
            persistence: parts.persistence,
            settings: parts.settings,
            queue,
        }
    }

    // --- Permission gate ---

    /// Ask for every undetermined medium and hold the queue until the user
    /// answers or the timeout passes, so commands queued behind the request
    /// see the answer.
    pub fn request_permissions(&mut self) {
        let mut pending = Vec::new();
        for medium in [Medium::Camera, Medium::Microphone] {
            if self.gate.get(medium).is_determined() {
                continue;
            }
            let current = self.device.authorization_status(medium);
            if current.is_determined() {
                if self.gate.resolve(medium, current.is_granted()) {
                    self.publish_permissions();
                }
                continue;
            }

            log::info!("requesting {} access", medium);
            let gate = self.gate.clone();
            let queue = self.queue.clone();
            self.device.request_access(
                medium,
                Box::new(move |granted| {
                    if gate.resolve(medium, granted) {
                        queue.submit(Box::new(|core: &mut SessionCore| core.publish_permissions()));
                    }
                }),
            );
            pending.push(medium);
        }

        if !pending.is_empty() && !self.gate.wait_resolved(&pending, self.settings.permission_timeout()) {
            log::warn!("permission request for {:?} still unanswered", pending);
        }
    }

    fn publish_permissions(&self) {
        let permissions = self.gate.snapshot();
        self.status.lock().permissions = permissions;
        self.notifier.notify(move |d| d.on_permissions_changed(&permissions));
    }

    /// Inputs the graph may use. Fails when neither medium is granted.
    fn graph_inputs(&self) -> Result<GraphInputs, CaptureError> {
        let inputs = GraphInputs {
            camera: self.gate.is_authorized(Medium::Camera),
            microphone: self.gate.is_authorized(Medium::Microphone),
        };
        if !inputs.camera && !inputs.microphone {
            return Err(CaptureError::PermissionDenied(Medium::Camera));
        }
        Ok(inputs)
    }

    // --- Session builder ---

    pub fn setup(&mut self, config: CaptureConfiguration, done: Option<SessionCompletion>) {
        let result = self.try_setup(config);
        self.publish_session();
        self.deliver_session("setup", result, done);
    }

    fn try_setup(&mut self, config: CaptureConfiguration) -> Result<SessionSnapshot, CaptureError> {
        if self.recording.is_some() {
            return Err(CaptureError::BusyRecording);
        }
        let inputs = self.graph_inputs()?;
        self.builder
            .setup(self.device.as_mut(), &self.capabilities, config, inputs)
            .map(|session| session.snapshot())
    }

    pub fn reconfigure(&mut self, config: CaptureConfiguration, done: Option<SessionCompletion>) {
        let result = self.try_reconfigure(config);
        self.publish_session();
        self.deliver_session("reconfigure", result, done);
    }

    fn try_reconfigure(&mut self, config: CaptureConfiguration) -> Result<SessionSnapshot, CaptureError> {
        if self.recording.is_some() {
            return Err(CaptureError::BusyRecording);
        }
        let inputs = self.graph_inputs()?;
        self.builder
            .reconfigure(self.device.as_mut(), &self.capabilities, config, inputs)?;
        self.builder.snapshot().ok_or(CaptureError::NotConfigured)
    }

    pub fn teardown(&mut self, done: Option<SessionCompletion>) {
        let result = if self.recording.is_some() {
            Err(CaptureError::BusyRecording)
        } else {
            let last = self.builder.snapshot();
            self.builder.teardown(self.device.as_mut());
            last.ok_or(CaptureError::NotConfigured)
        };
        self.publish_session();
        self.deliver_session("teardown", result, done);
    }

    fn deliver_session(
        &self,
        operation: &str,
        result: Result<SessionSnapshot, CaptureError>,
        done: Option<SessionCompletion>,
    ) {
        if let Err(e) = &result {
            log::warn!("session {} failed: {}", operation, e);
        }
        match done {
            Some(done) => self.notifier.dispatch(Box::new(move || done(result))),
            None => {
                if let Err(e) = result {
                    self.notifier.notify(move |d| d.on_error(&e));
                }
            }
        }
    }

    /// Push the session snapshot to the status and delegate if it changed.
    fn publish_session(&self) {
        let snapshot = self.builder.snapshot();
        {
            let mut status = self.status.lock();
            if status.session == snapshot {
                return;
            }
            status.session = snapshot.clone();
        }
        self.notifier.notify(move |d| d.on_session_changed(snapshot.as_ref()));
    }

    // --- Recording lifecycle ---

    pub fn start_recording(&mut self, kind: RecordingKind, completion: Option<Completion>) {
        let (session_id, config) = match self.check_can_start(kind) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("{} recording rejected: {}", kind, e);
                self.reject(e, completion);
                return;
            }
        };
        if let Err(e) = fs::create_dir_all(&self.settings.transient_directory) {
            let e = CaptureError::Capture(format!("transient storage unavailable: {}", e));
            self.reject(e, completion);
            return;
        }

        let id = Uuid::new_v4();
        let target = transient_target(&self.settings.transient_directory, kind.into(), id);
        let events = OutputEvents::new(id, kind, self.event_poster());
        self.recording = Some(RecordingHandle::new(
            id,
            kind,
            target.clone(),
            config,
            session_id,
            completion,
        ));
        self.publish_recording(kind);
        log::info!("starting {} recording {} -> {}", kind, id, target.display());

        if let Err(e) = self.device.start_file_output(kind, &target, &config, events) {
            self.fail_recording(e);
        }
    }

    /// Preconditions for leaving `Idle`. Never touches the handle.
    fn check_can_start(&self, kind: RecordingKind) -> Result<(Uuid, CaptureConfiguration), CaptureError> {
        for medium in required_media(kind) {
            self.gate.require(*medium)?;
        }
        if let Some(active) = &self.recording {
            return Err(CaptureError::ConflictingRecording { active: active.kind });
        }
        let session = self.builder.session().ok_or(CaptureError::NotConfigured)?;
        let port = output_port(kind);
        if !session.has_port(port) {
            return Err(CaptureError::DeviceUnavailable(format!(
                "session has no {:?}",
                port
            )));
        }
        Ok((session.id(), *session.configuration()))
    }

    fn reject(&self, error: CaptureError, completion: Option<Completion>) {
        match completion {
            Some(completion) => completion.complete(Err(error)),
            None => self.notifier.notify(move |d| d.on_error(&error)),
        }
    }

    fn event_poster(&self) -> Arc<dyn Fn(OutputEvent) + Send + Sync> {
        let queue = self.queue.clone();
        Arc::new(move |event: OutputEvent| {
            let posted = queue.submit(Box::new(move |core: &mut SessionCore| core.handle_output_event(event)));
            if !posted {
                log::debug!("output event dropped after shutdown");
            }
        })
    }

    pub fn handle_output_event(&mut self, event: OutputEvent) {
        let Some(handle) = self.recording.as_mut().filter(|h| h.id == event.recording_id) else {
            log::debug!("ignoring {:?} for finished recording {}", event.signal, event.recording_id);
            return;
        };

        match event.signal {
            OutputSignal::Started => {
                if handle.state != RecordingState::Starting {
                    log::debug!("duplicate start confirmation for {}", handle.id);
                    return;
                }
                handle.mark_live();
                let (id, stop_requested) = (handle.id, handle.stop_requested);
                log::info!("{} recording {} live", event.kind, id);
                self.publish_recording(event.kind);
                self.arm_duration_limit(id);
                if stop_requested {
                    log::info!("applying stop queued while {} was starting", id);
                    self.begin_stop();
                }
            }
            OutputSignal::Finished(Ok(())) => self.finish_recording(),
            OutputSignal::Finished(Err(e)) => self.fail_recording(e),
        }
    }

    pub fn stop_recording(&mut self, kind: RecordingKind) {
        let state = match self.recording.as_ref() {
            Some(handle) if handle.kind == kind => handle.state.clone(),
            _ => {
                log::debug!("stop {} ignored: no {} recording", kind, kind);
                return;
            }
        };
        match state {
            RecordingState::Recording => self.begin_stop(),
            RecordingState::Starting => {
                if let Some(handle) = self.recording.as_mut() {
                    handle.stop_requested = true;
                }
                log::info!("stop {} queued until the output confirms", kind);
            }
            other => log::debug!("stop {} ignored in {:?}", kind, other),
        }
    }

    /// Recording → Stopping → Finalizing. The artifact is delivered when the
    /// output reports its last buffer flushed.
    fn begin_stop(&mut self) {
        let kind = match self.recording.as_mut() {
            Some(handle) if handle.state == RecordingState::Recording => {
                handle.state = RecordingState::Stopping;
                handle.kind
            }
            _ => return,
        };
        self.publish_recording(kind);

        match self.device.stop_file_output(kind) {
            Ok(()) => {
                if let Some(handle) = self.recording.as_mut() {
                    handle.state = RecordingState::Finalizing;
                }
                self.publish_recording(kind);
            }
            Err(e) => self.fail_recording(e),
        }
    }

    fn stop_at_limit(&mut self, id: Uuid) {
        let live = self
            .recording
            .as_ref()
            .is_some_and(|h| h.id == id && h.state == RecordingState::Recording);
        if live {
            log::info!("recording {} reached the maximum duration", id);
            self.begin_stop();
        }
    }

    fn arm_duration_limit(&self, id: Uuid) {
        let Some(limit) = self.settings.max_duration() else {
            return;
        };
        let queue = self.queue.clone();
        let spawned = thread::Builder::new()
            .name("anonycord-duration-limit".into())
            .spawn(move || {
                thread::sleep(limit);
                queue.submit(Box::new(move |core: &mut SessionCore| core.stop_at_limit(id)));
            });
        if let Err(e) = spawned {
            log::warn!("could not arm duration limit for {}: {}", id, e);
        }
    }

    fn finish_recording(&mut self) {
        let Some(handle) = self.recording.take() else {
            return;
        };
        let (kind, session_id) = (handle.kind, handle.session_id);
        let (artifact, completion) = handle.finish();
        log::info!(
            "{} recording {} of session {} finalized ({:.2}s) at {}",
            kind,
            artifact.id,
            session_id,
            artifact.duration_secs.unwrap_or_default(),
            artifact.path.display()
        );

        self.set_recording_state(kind, RecordingState::Idle);
        if let Some(completion) = completion {
            completion.complete(Ok(artifact.clone()));
        }
        let result = Ok(artifact.clone());
        self.notifier.notify(move |d| d.on_recording_finished(kind, &result));

        if self.settings.auto_persist {
            self.persist(artifact, None);
        }
    }

    fn fail_recording(&mut self, error: CaptureError) {
        let Some(mut handle) = self.recording.take() else {
            return;
        };
        let kind = handle.kind;
        log::error!(
            "{} recording {} failed in {:?}: {} (output left at {})",
            kind,
            handle.id,
            handle.state,
            error,
            handle.output_target.display()
        );

        let completion = handle.take_completion();
        self.set_recording_state(kind, RecordingState::Failed(error.clone()));
        if let Some(completion) = completion {
            completion.complete(Err(error.clone()));
        }
        let result = Err(error);
        self.notifier.notify(move |d| d.on_recording_finished(kind, &result));
    }

    fn publish_recording(&self, kind: RecordingKind) {
        let state = self
            .recording
            .as_ref()
            .filter(|h| h.kind == kind)
            .map(|h| h.state.clone())
            .unwrap_or_default();
        self.set_recording_state(kind, state);
    }

    fn set_recording_state(&self, kind: RecordingKind, state: RecordingState) {
        {
            let mut status = self.status.lock();
            *status.state_mut(kind) = state.clone();
            status.active_recording = self.recording.as_ref().map(RecordingHandle::active);
        }
        log::debug!("{} state -> {:?}", kind, state);
        self.notifier.notify(move |d| d.on_state_changed(kind, &state));
    }

    // --- Photo ---

    pub fn take_photo(&mut self) {
        match self.capture_photo() {
            Ok(artifact) => {
                log::info!("photo {} captured at {}", artifact.id, artifact.path.display());
                self.persist(artifact, None);
            }
            Err(e) => {
                log::error!("photo capture failed: {}", e);
                self.notifier.notify(move |d| d.on_error(&e));
            }
        }
    }

    fn capture_photo(&mut self) -> Result<Artifact, CaptureError> {
        self.gate.require(Medium::Camera)?;
        let session = self.builder.session().ok_or(CaptureError::NotConfigured)?;
        if !session.has_port(Port::PhotoOutput) {
            return Err(CaptureError::DeviceUnavailable("session has no photo output".into()));
        }
        let config = *session.configuration();

        fs::create_dir_all(&self.settings.transient_directory)
            .map_err(|e| CaptureError::Capture(format!("transient storage unavailable: {}", e)))?;
        let id = Uuid::new_v4();
        let target = transient_target(&self.settings.transient_directory, ArtifactKind::Photo, id);
        self.device.capture_still(&target, &config)?;

        Ok(Artifact {
            id,
            kind: ArtifactKind::Photo,
            path: target,
            created_at: Utc::now(),
            duration_secs: None,
            configuration: config,
        })
    }

    // --- Persistence sink ---

    fn persist(&self, artifact: Artifact, done: Option<PersistCompletion>) {
        if !submit_persist(&self.persistence, &self.notifier, artifact, done) {
            log::error!("persistence worker is gone, artifact left on transient storage");
        }
    }

    // --- Shutdown ---

    /// Stop any output the device is still writing, fail the recording with
    /// `ShutDown` and release the session.
    pub fn shut_down(&mut self) {
        let writing = self
            .recording
            .as_ref()
            .map(|h| (h.kind, matches!(h.state, RecordingState::Starting | RecordingState::Recording)));
        if let Some((kind, writing)) = writing {
            if writing {
                if let Err(e) = self.device.stop_file_output(kind) {
                    log::warn!("could not stop {} output during shutdown: {}", kind, e);
                }
            }
            self.fail_recording(CaptureError::ShutDown);
        }
        self.builder.teardown(self.device.as_mut());
        self.publish_session();
    }
}

/// Queue `artifact` on the persistence worker. The result goes to `done`
/// when given, to the delegate otherwise.
pub(crate) fn submit_persist(
    queue: &QueueSender<PersistenceSink>,
    notifier: &Notifier,
    artifact: Artifact,
    done: Option<PersistCompletion>,
) -> bool {
    let notifier = notifier.clone();
    queue.submit(Box::new(move |sink: &mut PersistenceSink| {
        let result = sink.persist(&artifact);
        match done {
            Some(done) => notifier.dispatch(Box::new(move || done(result))),
            None => notifier.notify(move |d| d.on_persisted(&result)),
        }
    }))
}

fn transient_target(dir: &Path, kind: ArtifactKind, id: Uuid) -> PathBuf {
    dir.join(format!("{}_{}.{}", kind, id.simple(), kind.extension()))
}
