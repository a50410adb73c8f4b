use std::thread;
use std::time::Duration;

use crate::models::artifact::{Artifact, ArtifactKind, PersistOutcome, PersistResult};
use crate::models::error::{CaptureError, LibraryError};
use crate::models::settings::RecorderSettings;
use crate::traits::media_library::{MediaLibrary, SavedAsset};

/// Commits artifacts to the media library.
///
/// A transient library failure is retried once after `retry_delay`; any
/// other failure is reported as is. The transient file is never removed on
/// failure.
pub struct PersistenceSink {
    library: Box<dyn MediaLibrary>,
    retry_delay: Duration,
    diagnostic_on_save: bool,
}

impl PersistenceSink {
    pub fn new(library: Box<dyn MediaLibrary>, settings: &RecorderSettings) -> Self {
        Self {
            library,
            retry_delay: settings.persist_retry_delay(),
            diagnostic_on_save: settings.diagnostic_on_save,
        }
    }

    pub fn persist(&mut self, artifact: &Artifact) -> PersistResult {
        let outcome = match self.save_with_retry(artifact) {
            Ok(asset) => {
                log::info!("{} {} saved to {}", artifact.kind, artifact.id, asset.location.display());
                if self.diagnostic_on_save && artifact.kind != ArtifactKind::Audio {
                    log_diagnostic(artifact, &asset);
                }
                PersistOutcome::Saved {
                    location: asset.location,
                    checksum: asset.checksum,
                }
            }
            Err(e) => {
                log::error!(
                    "failed to persist {} {}, kept at {}: {}",
                    artifact.kind,
                    artifact.id,
                    artifact.path.display(),
                    e
                );
                PersistOutcome::Failed(e.reason().to_string())
            }
        };
        PersistResult {
            outcome,
            artifact_kind: artifact.kind,
            artifact: artifact.clone(),
        }
    }

    fn save_with_retry(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError> {
        match self.library.save(artifact) {
            Err(e) if e.is_transient() => {
                log::warn!("persist of {} hit a transient failure, retrying once: {}", artifact.id, e);
                thread::sleep(self.retry_delay);
                self.library.save(artifact)
            }
            result => result,
        }
    }
}

impl PersistResult {
    /// The failure as a `CaptureError::PersistFailed`, if the persist failed.
    pub fn error(&self) -> Option<CaptureError> {
        match &self.outcome {
            PersistOutcome::Failed(reason) => Some(CaptureError::PersistFailed(reason.clone())),
            PersistOutcome::Saved { .. } => None,
        }
    }
}

/// Harmless stand-in for the old "crash upon saving" toggle.
fn log_diagnostic(artifact: &Artifact, asset: &SavedAsset) {
    let size = std::fs::metadata(&asset.location).map(|m| m.len()).unwrap_or(0);
    log::info!(
        target: "anonycord::diagnostic",
        "saved {} id={} bytes={} sha256={} duration={:?}",
        artifact.kind,
        artifact.id,
        size,
        asset.checksum,
        artifact.duration_secs
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::config::CaptureConfiguration;

    struct ScriptedLibrary {
        failures: VecDeque<LibraryError>,
        attempts: usize,
    }

    impl MediaLibrary for ScriptedLibrary {
        fn save(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError> {
            self.attempts += 1;
            if let Some(failure) = self.failures.pop_front() {
                return Err(failure);
            }
            Ok(SavedAsset {
                location: PathBuf::from("/library").join(artifact.path.file_name().unwrap()),
                checksum: "abc".into(),
            })
        }
    }

    fn sink(failures: Vec<LibraryError>) -> PersistenceSink {
        let settings = RecorderSettings {
            persist_retry_delay_ms: 1,
            ..Default::default()
        };
        let library = ScriptedLibrary {
            failures: failures.into(),
            attempts: 0,
        };
        PersistenceSink::new(Box::new(library), &settings)
    }

    fn photo() -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            kind: ArtifactKind::Photo,
            path: PathBuf::from("/tmp/photo.png"),
            created_at: Utc::now(),
            duration_secs: None,
            configuration: CaptureConfiguration::default(),
        }
    }

    #[test]
    fn saves_on_first_attempt() {
        let mut sink = sink(vec![]);
        let result = sink.persist(&photo());
        assert!(result.is_saved());
        assert_eq!(result.artifact_kind, ArtifactKind::Photo);
        assert!(result.error().is_none());
    }

    #[test]
    fn retries_transient_failure_once() {
        let mut sink = sink(vec![LibraryError::Transient("locked".into())]);
        let result = sink.persist(&photo());
        assert!(result.is_saved());
    }

    #[test]
    fn gives_up_after_second_transient_failure() {
        let mut sink = sink(vec![
            LibraryError::Transient("locked".into()),
            LibraryError::Transient("still locked".into()),
        ]);
        let result = sink.persist(&photo());
        assert_eq!(result.outcome, PersistOutcome::Failed("still locked".into()));
        assert_eq!(result.error(), Some(CaptureError::PersistFailed("still locked".into())));
        assert_eq!(result.artifact.path, PathBuf::from("/tmp/photo.png"));
    }

    #[test]
    fn does_not_retry_permanent_failure() {
        let mut sink = sink(vec![
            LibraryError::Permanent("disk full".into()),
            LibraryError::Transient("unused".into()),
        ]);
        let result = sink.persist(&photo());
        assert_eq!(result.outcome, PersistOutcome::Failed("disk full".into()));
    }
}
