//! Media library fault injection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anonycord_core::models::artifact::Artifact;
use anonycord_core::models::error::LibraryError;
use anonycord_core::traits::media_library::{MediaLibrary, SavedAsset};

/// Wraps a library and fails the next saves with scripted errors.
pub struct FlakyLibrary<L> {
    inner: L,
    failures: VecDeque<LibraryError>,
    attempts: Arc<AtomicUsize>,
}

impl<L: MediaLibrary> FlakyLibrary<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            failures: VecDeque::new(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue `error` for the next save that has no failure scripted yet.
    pub fn fail_next(mut self, error: LibraryError) -> Self {
        self.failures.push_back(error);
        self
    }

    /// Fail the next `count` saves as if the library were locked.
    pub fn locked_for(self, count: usize) -> Self {
        (0..count).fold(self, |library, _| {
            library.fail_next(LibraryError::Transient("library locked by another writer".into()))
        })
    }

    /// Shared counter of save attempts, including failed ones.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl<L: MediaLibrary> MediaLibrary for FlakyLibrary<L> {
    fn save(&mut self, artifact: &Artifact) -> Result<SavedAsset, LibraryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.pop_front() {
            log::warn!("injected library failure for {}: {}", artifact.id, error);
            return Err(error);
        }
        self.inner.save(artifact)
    }
}
