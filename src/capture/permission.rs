//! Microphone permission gate.
//!
//! Queries and requests the platform's microphone permission. Platforms
//! that cannot report state degrade to Prompt; every acquisition failure
//! maps to Denied and never propagates as an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::backend::CaptureBackend;

/// Microphone permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    /// Not yet queried
    Unknown,

    /// The platform will ask the user on first acquisition
    Prompt,

    /// Access has been granted
    Granted,

    /// Access has been refused
    Denied,
}

/// Gate in front of the platform's microphone permission.
pub struct PermissionGate {
    backend: Arc<dyn CaptureBackend>,
    state: PermissionState,
    changes: Option<watch::Receiver<PermissionState>>,
}

impl PermissionGate {
    /// Create a gate over a capture backend, subscribing to out-of-band
    /// permission changes when the platform supports them.
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        let changes = backend.watch_permission();
        Self {
            backend,
            state: PermissionState::Unknown,
            changes,
        }
    }

    /// Current state without touching the platform.
    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Record a state observed by another component (e.g. the recording
    /// controller learning the answer from stream acquisition).
    pub fn set(&mut self, state: PermissionState) {
        self.state = state;
    }

    /// Non-blocking best-effort query.
    ///
    /// Re-reads any pending out-of-band change first, then falls back to
    /// the backend; backends that cannot report state yield Prompt.
    pub fn query(&mut self) -> PermissionState {
        if let Some(rx) = &mut self.changes {
            if rx.has_changed().unwrap_or(false) {
                self.state = *rx.borrow_and_update();
                return self.state;
            }
        }

        if self.state == PermissionState::Unknown {
            self.state = self
                .backend
                .query_permission()
                .unwrap_or(PermissionState::Prompt);
        }
        self.state
    }

    /// Trigger the platform consent dialog by opening and immediately
    /// closing a capture stream. Resolves to Granted or Denied; failures
    /// are absorbed, never propagated.
    pub async fn request(&mut self) -> PermissionState {
        let backend = self.backend.clone();
        let outcome = tokio::task::spawn_blocking(move || backend.probe()).await;

        self.state = match outcome {
            Ok(Ok(())) => PermissionState::Granted,
            Ok(Err(err)) => {
                debug!(error = %err, "microphone probe failed");
                PermissionState::Denied
            }
            Err(err) => {
                debug!(error = %err, "microphone probe task failed");
                PermissionState::Denied
            }
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::FakeCapture;
    use crate::capture::CaptureError;

    #[tokio::test]
    async fn test_request_granted_on_successful_probe() {
        let backend = FakeCapture::new();
        let mut gate = PermissionGate::new(Arc::new(backend.clone()));

        assert_eq!(gate.query(), PermissionState::Prompt);
        assert_eq!(gate.request().await, PermissionState::Granted);
        assert_eq!(backend.probes(), 1);
        // The probe stream was opened and closed again
        assert_eq!(backend.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_request_maps_failure_to_denied() {
        let backend = FakeCapture::new();
        backend.fail_next(CaptureError::PermissionRefused);
        let mut gate = PermissionGate::new(Arc::new(backend.clone()));

        assert_eq!(gate.request().await, PermissionState::Denied);
        assert_eq!(gate.state(), PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_out_of_band_change_is_observed() {
        let backend = FakeCapture::new();
        backend.set_reported(Some(PermissionState::Granted));
        let mut gate = PermissionGate::new(Arc::new(backend.clone()));

        assert_eq!(gate.query(), PermissionState::Granted);

        backend.notify_change(PermissionState::Denied);
        assert_eq!(gate.query(), PermissionState::Denied);
    }
}
