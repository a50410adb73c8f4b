use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::artifact::{Artifact, RecordingKind};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::graph::Port;
use crate::models::permissions::Medium;
use crate::models::state::{ActiveRecording, RecordingState};

use super::notifier::Notifier;

/// Media a recording of `kind` needs permission for.
pub(crate) fn required_media(kind: RecordingKind) -> &'static [Medium] {
    match kind {
        RecordingKind::Video => &[Medium::Camera, Medium::Microphone],
        RecordingKind::Audio => &[Medium::Microphone],
    }
}

/// Output port a recording of `kind` writes through.
pub(crate) fn output_port(kind: RecordingKind) -> Port {
    match kind {
        RecordingKind::Video => Port::MovieOutput,
        RecordingKind::Audio => Port::AudioOutput,
    }
}

type CompletionFn = Box<dyn FnOnce(Result<Artifact, CaptureError>) + Send + 'static>;

/// Caller completion for a video recording, delivered exactly once.
///
/// `complete` hands the result to the dispatcher. If the completion is
/// dropped without being completed (the job never ran because the recorder
/// shut down), it is delivered `ShutDown` instead.
pub(crate) struct Completion {
    callback: Option<CompletionFn>,
    notifier: Notifier,
}

impl Completion {
    pub fn new(callback: CompletionFn, notifier: Notifier) -> Self {
        Self {
            callback: Some(callback),
            notifier,
        }
    }

    pub fn complete(mut self, result: Result<Artifact, CaptureError>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<Artifact, CaptureError>) {
        if let Some(callback) = self.callback.take() {
            self.notifier.dispatch(Box::new(move || callback(result)));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.deliver(Err(CaptureError::ShutDown));
    }
}

/// One in-flight recording. At most one exists at a time.
pub(crate) struct RecordingHandle {
    pub id: Uuid,
    pub kind: RecordingKind,
    pub started_at: DateTime<Utc>,
    pub output_target: PathBuf,
    pub state: RecordingState,
    /// Frozen copy of the session configuration at start.
    pub configuration: CaptureConfiguration,
    /// Session the recording runs on. Not owned.
    pub session_id: Uuid,
    /// Set by a stop that arrived while still `Starting`.
    pub stop_requested: bool,
    live_since: Option<Instant>,
    completion: Option<Completion>,
}

impl RecordingHandle {
    pub fn new(
        id: Uuid,
        kind: RecordingKind,
        output_target: PathBuf,
        configuration: CaptureConfiguration,
        session_id: Uuid,
        completion: Option<Completion>,
    ) -> Self {
        Self {
            id,
            kind,
            started_at: Utc::now(),
            output_target,
            state: RecordingState::Starting,
            configuration,
            session_id,
            stop_requested: false,
            live_since: None,
            completion,
        }
    }

    pub fn mark_live(&mut self) {
        self.live_since = Some(Instant::now());
        self.state = RecordingState::Recording;
    }

    /// Seconds since the output went live; zero if it never did.
    pub fn recorded_secs(&self) -> f64 {
        self.live_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn active(&self) -> ActiveRecording {
        ActiveRecording {
            id: self.id,
            kind: self.kind,
            started_at: self.started_at,
            output_target: self.output_target.clone(),
        }
    }

    /// Consume the handle into its artifact and pending completion.
    pub fn finish(mut self) -> (Artifact, Option<Completion>) {
        let artifact = Artifact {
            id: self.id,
            kind: self.kind.into(),
            path: self.output_target.clone(),
            created_at: self.started_at,
            duration_secs: Some(self.recorded_secs()),
            configuration: self.configuration,
        };
        (artifact, self.completion.take())
    }

    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_completion(calls: &Arc<AtomicUsize>, errors: &Arc<AtomicUsize>) -> Completion {
        let calls = Arc::clone(calls);
        let errors = Arc::clone(errors);
        Completion::new(
            Box::new(move |result| {
                calls.fetch_add(1, Ordering::SeqCst);
                if result.is_err() {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            }),
            Notifier::new(),
        )
    }

    #[test]
    fn completion_fires_once_when_completed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let completion = counting_completion(&calls, &errors);
        completion.complete(Err(CaptureError::Capture("boom".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_completion_reports_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        drop(counting_completion(&calls, &errors));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handle_starts_in_starting_and_finishes_into_artifact() {
        let mut handle = RecordingHandle::new(
            Uuid::new_v4(),
            RecordingKind::Audio,
            PathBuf::from("/tmp/audio.wav"),
            CaptureConfiguration::default(),
            Uuid::new_v4(),
            None,
        );
        assert_eq!(handle.state, RecordingState::Starting);
        assert_eq!(handle.recorded_secs(), 0.0);

        handle.mark_live();
        assert!(handle.state.is_recording());

        let (artifact, completion) = handle.finish();
        assert!(completion.is_none());
        assert_eq!(artifact.path, PathBuf::from("/tmp/audio.wav"));
        assert!(artifact.duration_secs.is_some());
    }

    #[test]
    fn video_needs_both_media() {
        assert_eq!(required_media(RecordingKind::Video).len(), 2);
        assert_eq!(required_media(RecordingKind::Audio), &[Medium::Microphone]);
        assert_eq!(output_port(RecordingKind::Audio), Port::AudioOutput);
    }
}
