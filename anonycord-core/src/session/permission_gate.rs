use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::models::permissions::{Authorization, Medium, PermissionState};

struct GateInner {
    state: Mutex<PermissionState>,
    resolved: Condvar,
}

/// Process-wide camera and microphone authorization.
///
/// The only state shared across threads without going through the session
/// queue: callers read it directly, platform callbacks resolve it.
#[derive(Clone)]
pub struct PermissionGate {
    inner: Arc<GateInner>,
}

impl PermissionGate {
    pub fn new(initial: PermissionState) -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(initial),
                resolved: Condvar::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> PermissionState {
        *self.inner.state.lock()
    }

    pub fn get(&self, medium: Medium) -> Authorization {
        self.inner.state.lock().get(medium)
    }

    pub fn is_authorized(&self, medium: Medium) -> bool {
        self.get(medium).is_granted()
    }

    /// `Ok` if `medium` is granted, `PermissionDenied` otherwise.
    pub fn require(&self, medium: Medium) -> Result<(), CaptureError> {
        if self.is_authorized(medium) {
            Ok(())
        } else {
            Err(CaptureError::PermissionDenied(medium))
        }
    }

    /// Record the user's answer for `medium`.
    ///
    /// Only an undetermined medium is updated, so each medium changes at
    /// most once. Returns whether this call changed the state.
    pub fn resolve(&self, medium: Medium, granted: bool) -> bool {
        let mut state = self.inner.state.lock();
        let slot = state.slot_mut(medium);
        if slot.is_determined() {
            log::debug!("{} permission already {:?}, ignoring answer", medium, slot);
            return false;
        }
        *slot = if granted {
            Authorization::Granted
        } else {
            Authorization::Denied
        };
        log::info!("{} permission {:?}", medium, slot);
        drop(state);
        self.inner.resolved.notify_all();
        true
    }

    /// Block until every medium in `media` is determined or `timeout`
    /// elapses. Returns true if all were determined.
    pub fn wait_resolved(&self, media: &[Medium], timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if media.iter().all(|m| state.get(*m).is_determined()) {
                return true;
            }
            if self.inner.resolved.wait_until(&mut state, deadline).timed_out() {
                return media.iter().all(|m| state.get(*m).is_determined());
            }
        }
    }
}
