//! Software camera + microphone.
//!
//! Behaves like a platform capture backend: ports are validated against the
//! advertised capabilities, audio is written by a dedicated capture thread,
//! and every output reports through `OutputEvents`. A `SimControl` handle
//! lets tests answer prompts, confirm outputs and inject faults.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::ImageFormat;
use parking_lot::Mutex;

use anonycord_core::models::artifact::RecordingKind;
use anonycord_core::models::capabilities::{DeviceCapabilities, VideoFormat};
use anonycord_core::models::config::{AudioChannels, CaptureConfiguration, FrameRate, Lens, Resolution};
use anonycord_core::models::error::CaptureError;
use anonycord_core::models::graph::Port;
use anonycord_core::models::permissions::{Authorization, Medium, PermissionState};
use anonycord_core::processing::wav_format::{grow_data_size, pcm16_le, WavSpec, MAX_DATA_SIZE};
use anonycord_core::traits::capture_device::{AccessCallback, CaptureDevice, OutputEvents};

use crate::synth;

/// Length of one simulated microphone buffer.
const AUDIO_CHUNK: Duration = Duration::from_millis(10);

fn formats(list: &[(Resolution, FrameRate)]) -> BTreeSet<VideoFormat> {
    list.iter()
        .map(|&(resolution, frame_rate)| VideoFormat { resolution, frame_rate })
        .collect()
}

/// Wide, ultra-wide and selfie cameras; 4K60 on the wide lens only.
pub fn flagship_capabilities() -> DeviceCapabilities {
    let standard = formats(&[
        (Resolution::Hd1080, FrameRate::Fps30),
        (Resolution::Uhd4k, FrameRate::Fps30),
    ]);
    let wide = formats(&[
        (Resolution::Hd1080, FrameRate::Fps30),
        (Resolution::Uhd4k, FrameRate::Fps30),
        (Resolution::Uhd4k, FrameRate::Fps60),
    ]);
    DeviceCapabilities {
        lenses: BTreeMap::from([
            (Lens::Wide, wide),
            (Lens::UltraWide, standard.clone()),
            (Lens::Selfie, standard),
        ]),
        has_microphone: true,
        supports_stereo: true,
    }
}

/// Wide and selfie cameras at 30 fps, mono microphone.
pub fn budget_capabilities() -> DeviceCapabilities {
    let standard = formats(&[
        (Resolution::Hd1080, FrameRate::Fps30),
        (Resolution::Uhd4k, FrameRate::Fps30),
    ]);
    DeviceCapabilities {
        lenses: BTreeMap::from([(Lens::Wide, standard.clone()), (Lens::Selfie, standard)]),
        has_microphone: true,
        supports_stereo: false,
    }
}

/// Static description of the simulated hardware.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub capabilities: DeviceCapabilities,
    /// Authorization before any prompt.
    pub authorization: PermissionState,
    /// What the simulated user answers when prompted.
    pub answers: PermissionState,
    /// Answer prompts from another thread after this delay.
    pub prompt_delay: Option<Duration>,
    /// Stills are rendered at the configured resolution divided by this.
    pub still_downscale: u32,
    /// Leave outputs starting until `SimControl::confirm_start`.
    pub manual_start: bool,
    /// Largest PCM payload an audio output may write before it fails.
    pub max_wav_data_bytes: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            capabilities: flagship_capabilities(),
            authorization: PermissionState::default(),
            answers: PermissionState {
                camera: Authorization::Granted,
                microphone: Authorization::Granted,
            },
            prompt_delay: None,
            still_downscale: 4,
            manual_start: false,
            max_wav_data_bytes: MAX_DATA_SIZE,
        }
    }
}

impl SimConfig {
    /// Both permissions already granted.
    pub fn authorized() -> Self {
        let config = Self::default();
        Self {
            authorization: config.answers,
            ..config
        }
    }
}

/// Observable state of the simulated capture graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimGraph {
    pub ports: Vec<Port>,
    pub formats: BTreeMap<Lens, VideoFormat>,
    pub running: bool,
    /// Bumped by every commit that changed the graph.
    pub generation: u64,
}

#[derive(Default)]
struct Faults {
    attach: Option<Port>,
    commit: Option<CaptureError>,
    output: Option<CaptureError>,
    still: Option<CaptureError>,
}

enum Writer {
    Video {
        target: PathBuf,
        width: u32,
        height: u32,
    },
    Audio {
        running: Arc<AtomicBool>,
        failure: Arc<Mutex<Option<CaptureError>>>,
        thread: thread::JoinHandle<Result<(), CaptureError>>,
    },
}

impl Writer {
    /// Flush and close. Returns the outcome to report as `finished`.
    fn finish(self) -> Result<(), CaptureError> {
        match self {
            Writer::Video { target, width, height } => {
                let mut file = OpenOptions::new()
                    .append(true)
                    .open(&target)
                    .map_err(|e| write_error(&target, e))?;
                file.write_all(&synth::gray_frame(width, height, 16))
                    .map_err(|e| write_error(&target, e))
            }
            Writer::Audio { running, thread, .. } => {
                running.store(false, Ordering::SeqCst);
                thread
                    .join()
                    .unwrap_or_else(|_| Err(CaptureError::Capture("audio capture thread panicked".into())))
            }
        }
    }

    /// Abort mid-write with `error`, leaving the partial file behind.
    fn fail(self, error: CaptureError) -> Result<(), CaptureError> {
        match self {
            Writer::Video { .. } => Err(error),
            Writer::Audio {
                running,
                failure,
                thread,
            } => {
                *failure.lock() = Some(error.clone());
                running.store(false, Ordering::SeqCst);
                match thread.join() {
                    Ok(Err(e)) => Err(e),
                    _ => Err(error),
                }
            }
        }
    }
}

struct ActiveOutput {
    events: OutputEvents,
    writer: Writer,
}

struct SimState {
    config: SimConfig,
    graph: SimGraph,
    dirty: bool,
    faults: Faults,
    outputs: HashMap<RecordingKind, ActiveOutput>,
    prompts: Vec<Medium>,
}

/// The simulated device, handed to `MediaRecorder`.
pub struct SimulatedDevice {
    shared: Arc<Mutex<SimState>>,
}

/// Test-side handle to a `SimulatedDevice`.
#[derive(Clone)]
pub struct SimControl {
    shared: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new(config: SimConfig) -> (Self, SimControl) {
        let shared = Arc::new(Mutex::new(SimState {
            config,
            graph: SimGraph::default(),
            dirty: false,
            faults: Faults::default(),
            outputs: HashMap::new(),
            prompts: Vec::new(),
        }));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            SimControl { shared },
        )
    }
}

impl SimControl {
    pub fn graph(&self) -> SimGraph {
        self.shared.lock().graph.clone()
    }

    /// Media the user has been prompted for, in order.
    pub fn prompts(&self) -> Vec<Medium> {
        self.shared.lock().prompts.clone()
    }

    pub fn set_answers(&self, answers: PermissionState) {
        self.shared.lock().config.answers = answers;
    }

    /// Revoke or grant access behind the recorder's back.
    pub fn set_authorization(&self, authorization: PermissionState) {
        self.shared.lock().config.authorization = authorization;
    }

    pub fn set_manual_start(&self, manual: bool) {
        self.shared.lock().config.manual_start = manual;
    }

    pub fn fail_next_attach(&self, port: Port) {
        self.shared.lock().faults.attach = Some(port);
    }

    pub fn fail_next_commit(&self, error: CaptureError) {
        self.shared.lock().faults.commit = Some(error);
    }

    pub fn fail_next_output(&self, error: CaptureError) {
        self.shared.lock().faults.output = Some(error);
    }

    pub fn fail_next_still(&self, error: CaptureError) {
        self.shared.lock().faults.still = Some(error);
    }

    pub fn is_writing(&self, kind: RecordingKind) -> bool {
        self.shared.lock().outputs.contains_key(&kind)
    }

    /// Report the output of `kind` as live. Returns false if none exists.
    pub fn confirm_start(&self, kind: RecordingKind) -> bool {
        let events = self.shared.lock().outputs.get(&kind).map(|o| o.events.clone());
        match events {
            Some(events) => {
                events.started();
                true
            }
            None => false,
        }
    }

    /// Kill the output of `kind` mid-write. The failure is reported through
    /// its events before this returns.
    pub fn break_output(&self, kind: RecordingKind, error: CaptureError) -> bool {
        let output = self.shared.lock().outputs.remove(&kind);
        let Some(output) = output else {
            return false;
        };
        log::warn!("simulated {} output failing: {}", kind, error);
        let result = output.writer.fail(error);
        output.events.finished(result);
        true
    }
}

impl CaptureDevice for SimulatedDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.shared.lock().config.capabilities.clone()
    }

    fn authorization_status(&self, medium: Medium) -> Authorization {
        self.shared.lock().config.authorization.get(medium)
    }

    fn request_access(&mut self, medium: Medium, callback: AccessCallback) {
        let delay = {
            let mut state = self.shared.lock();
            state.prompts.push(medium);
            state.config.prompt_delay
        };
        let Some(delay) = delay else {
            answer_prompt(&self.shared, medium, callback);
            return;
        };

        let pending = Arc::new(Mutex::new(Some(callback)));
        let shared = Arc::clone(&self.shared);
        let in_thread = Arc::clone(&pending);
        let spawned = thread::Builder::new()
            .name("anonycord-sim-prompt".into())
            .spawn(move || {
                thread::sleep(delay);
                if let Some(callback) = in_thread.lock().take() {
                    answer_prompt(&shared, medium, callback);
                }
            });
        if let Err(e) = spawned {
            log::warn!("prompt thread unavailable ({}), answering inline", e);
            if let Some(callback) = pending.lock().take() {
                answer_prompt(&self.shared, medium, callback);
            }
        }
    }

    fn begin_configuration(&mut self) {
        log::debug!("simulated graph: begin configuration");
    }

    fn commit_configuration(&mut self) -> Result<(), CaptureError> {
        let mut state = self.shared.lock();
        if let Some(e) = state.faults.commit.take() {
            return Err(e);
        }
        if state.dirty {
            state.dirty = false;
            state.graph.generation += 1;
            log::debug!("simulated graph committed, generation {}", state.graph.generation);
        }
        Ok(())
    }

    fn attach(&mut self, port: Port) -> Result<(), CaptureError> {
        let mut state = self.shared.lock();
        if state.faults.attach == Some(port) {
            state.faults.attach = None;
            return Err(CaptureError::DeviceUnavailable(format!("{:?} is in use", port)));
        }
        if state.graph.ports.contains(&port) {
            return Err(CaptureError::ConfigurationConflict(format!("{:?} already attached", port)));
        }

        let capabilities = &state.config.capabilities;
        match port {
            Port::Camera(lens) => {
                if !capabilities.has_lens(lens) {
                    return Err(CaptureError::DeviceUnavailable(format!("no {} camera", lens)));
                }
                if state.graph.ports.iter().any(|p| matches!(p, Port::Camera(_))) {
                    return Err(CaptureError::ConfigurationConflict(
                        "only one camera input at a time".into(),
                    ));
                }
            }
            Port::Microphone(format) => {
                if !capabilities.has_microphone {
                    return Err(CaptureError::DeviceUnavailable("no microphone".into()));
                }
                if format.channels == AudioChannels::Stereo && !capabilities.supports_stereo {
                    return Err(CaptureError::ConfigurationConflict("microphone is mono".into()));
                }
            }
            Port::MovieOutput | Port::AudioOutput | Port::PhotoOutput => {}
        }

        state.graph.ports.push(port);
        state.dirty = true;
        Ok(())
    }

    fn detach(&mut self, port: Port) {
        let mut state = self.shared.lock();
        let before = state.graph.ports.len();
        state.graph.ports.retain(|p| *p != port);
        if let Port::Camera(lens) = port {
            state.graph.formats.remove(&lens);
        }
        if state.graph.ports.len() != before {
            state.dirty = true;
        }
    }

    fn set_video_format(&mut self, lens: Lens, format: VideoFormat) -> Result<(), CaptureError> {
        let mut state = self.shared.lock();
        if !state.graph.ports.contains(&Port::Camera(lens)) {
            return Err(CaptureError::DeviceUnavailable(format!("{} camera not attached", lens)));
        }
        if !state.config.capabilities.supports(lens, format) {
            return Err(CaptureError::ConfigurationConflict(format!(
                "{} camera cannot do {} at {} fps",
                lens,
                format.resolution,
                format.frame_rate.fps()
            )));
        }
        state.graph.formats.insert(lens, format);
        state.dirty = true;
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        let mut state = self.shared.lock();
        if state.graph.ports.is_empty() {
            return Err(CaptureError::ConfigurationConflict("empty capture graph".into()));
        }
        state.graph.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.shared.lock().graph.running = false;
    }

    fn start_file_output(
        &mut self,
        kind: RecordingKind,
        target: &Path,
        config: &CaptureConfiguration,
        events: OutputEvents,
    ) -> Result<(), CaptureError> {
        let mut state = self.shared.lock();
        if let Some(e) = state.faults.output.take() {
            return Err(e);
        }
        if !state.graph.running {
            return Err(CaptureError::Capture("capture graph is not running".into()));
        }
        if state.outputs.contains_key(&kind) {
            return Err(CaptureError::Capture(format!("{} output already writing", kind)));
        }
        let (output_port, input_present) = match kind {
            RecordingKind::Video => (
                Port::MovieOutput,
                state.graph.ports.iter().any(|p| matches!(p, Port::Camera(_))),
            ),
            RecordingKind::Audio => (
                Port::AudioOutput,
                state.graph.ports.iter().any(|p| matches!(p, Port::Microphone(_))),
            ),
        };
        if !input_present || !state.graph.ports.contains(&output_port) {
            return Err(CaptureError::DeviceUnavailable(format!("no {} path in the graph", kind)));
        }

        let writer = match kind {
            RecordingKind::Video => start_video(target, config)?,
            RecordingKind::Audio => {
                let limit = state.config.max_wav_data_bytes;
                start_audio(target, config, limit, Arc::clone(&self.shared), events.clone())?
            }
        };
        log::debug!("simulated {} output writing {}", kind, target.display());
        state.outputs.insert(
            kind,
            ActiveOutput {
                events: events.clone(),
                writer,
            },
        );
        let manual = state.config.manual_start;
        drop(state);

        if !manual {
            events.started();
        }
        Ok(())
    }

    fn stop_file_output(&mut self, kind: RecordingKind) -> Result<(), CaptureError> {
        let output = self.shared.lock().outputs.remove(&kind);
        let Some(output) = output else {
            return Err(CaptureError::Capture(format!("no {} output is writing", kind)));
        };
        let result = output.writer.finish();
        if let Err(e) = &result {
            log::error!("simulated {} output failed to finalize: {}", kind, e);
        }
        output.events.finished(result);
        Ok(())
    }

    fn capture_still(&mut self, target: &Path, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        let downscale = {
            let mut state = self.shared.lock();
            if let Some(e) = state.faults.still.take() {
                return Err(e);
            }
            if !state.graph.running || !state.graph.ports.contains(&Port::PhotoOutput) {
                return Err(CaptureError::DeviceUnavailable("photo output not running".into()));
            }
            state.config.still_downscale.max(1)
        };

        let (width, height) = config.resolution.dimensions();
        synth::test_card(width / downscale, height / downscale)
            .save_with_format(target, ImageFormat::Png)
            .map_err(|e| CaptureError::Capture(format!("failed to encode still: {}", e)))
    }
}

fn answer_prompt(shared: &Mutex<SimState>, medium: Medium, callback: AccessCallback) {
    let answer = {
        let mut state = shared.lock();
        let answer = state.config.answers.get(medium);
        let slot = match medium {
            Medium::Camera => &mut state.config.authorization.camera,
            Medium::Microphone => &mut state.config.authorization.microphone,
        };
        *slot = answer;
        answer
    };
    log::info!("simulated user answered {} prompt: {:?}", medium, answer);
    callback(answer.is_granted());
}

fn write_error(target: &Path, e: std::io::Error) -> CaptureError {
    CaptureError::Capture(format!("failed to write {}: {}", target.display(), e))
}

fn start_video(target: &Path, config: &CaptureConfiguration) -> Result<Writer, CaptureError> {
    let (width, height) = config.resolution.dimensions();
    let header = synth::y4m_header(width, height, config.frame_rate.fps());
    let mut file = File::create(target).map_err(|e| write_error(target, e))?;
    file.write_all(header.as_bytes()).map_err(|e| write_error(target, e))?;
    Ok(Writer::Video {
        target: target.to_path_buf(),
        width,
        height,
    })
}

/// Spawn the microphone thread. Stopping it patches the WAV header; if the
/// payload would pass `limit`, the thread seals the file itself and reports
/// the failure through `events`.
fn start_audio(
    target: &Path,
    config: &CaptureConfiguration,
    limit: u32,
    shared: Arc<Mutex<SimState>>,
    events: OutputEvents,
) -> Result<Writer, CaptureError> {
    let format = config.audio_format();
    let spec = WavSpec::pcm16(format);
    let mut file = File::create(target).map_err(|e| write_error(target, e))?;
    file.write_all(&spec.header(0)).map_err(|e| write_error(target, e))?;

    let running = Arc::new(AtomicBool::new(true));
    let failure = Arc::new(Mutex::new(None));
    let path = target.to_path_buf();
    let thread_running = Arc::clone(&running);
    let thread_failure = Arc::clone(&failure);

    let thread = thread::Builder::new()
        .name("anonycord-sim-audio".into())
        .spawn(move || -> Result<(), CaptureError> {
            let chunk_frames = (format.sample_rate_hz as u64 * AUDIO_CHUNK.as_millis() as u64 / 1000) as usize;
            let mut frames_written = 0u64;
            let mut data_size = 0u32;
            loop {
                let samples = synth::tone(format, frames_written, chunk_frames, synth::TONE_HZ);
                let bytes = pcm16_le(&samples);
                let Some(next_size) = grow_data_size(data_size, bytes.len(), limit) else {
                    return Err(seal_at_limit(&mut file, &path, &spec, data_size, &shared, &events));
                };
                file.write_all(&bytes).map_err(|e| write_error(&path, e))?;
                frames_written += chunk_frames as u64;
                data_size = next_size;

                thread::sleep(AUDIO_CHUNK);
                if let Some(e) = thread_failure.lock().take() {
                    return Err(e);
                }
                if !thread_running.load(Ordering::SeqCst) {
                    break;
                }
            }

            file.seek(SeekFrom::Start(0)).map_err(|e| write_error(&path, e))?;
            file.write_all(&spec.header(data_size)).map_err(|e| write_error(&path, e))?;
            file.flush().map_err(|e| write_error(&path, e))?;
            log::debug!(
                "simulated audio finalized: {:.3}s in {}",
                spec.duration_secs(data_size as u64),
                path.display()
            );
            Ok(())
        })
        .map_err(|e| CaptureError::Capture(format!("failed to spawn audio thread: {}", e)))?;

    Ok(Writer::Audio {
        running,
        failure,
        thread,
    })
}

/// Close an audio file that reached its size limit and end the output.
///
/// Reports through `events` only if the output was still registered; a
/// concurrent stop that already took it reports the returned error instead.
fn seal_at_limit(
    file: &mut File,
    path: &Path,
    spec: &WavSpec,
    data_size: u32,
    shared: &Mutex<SimState>,
    events: &OutputEvents,
) -> CaptureError {
    log::warn!("simulated audio reached the WAV size limit at {} bytes", data_size);
    let sealed = file
        .seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&spec.header(data_size)))
        .and_then(|_| file.flush());
    let error = match sealed {
        Ok(()) => CaptureError::Capture(format!(
            "WAV size limit reached after {} bytes in {}",
            data_size,
            path.display()
        )),
        Err(e) => write_error(path, e),
    };

    let owned = shared.lock().outputs.remove(&RecordingKind::Audio).is_some();
    if owned {
        events.finished(Err(error.clone()));
    }
    error
}
