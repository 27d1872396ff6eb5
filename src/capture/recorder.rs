//! Recording state machine.
//!
//! Owns the hardware capture stream, the playback unit, the 1 Hz duration
//! timer, and the captured RecordingRef. At most one capture stream is
//! open and at most one playback unit is active at any time; acquiring a
//! new one always tears down the old one first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::RecordingRef;

use super::backend::{
    CaptureBackend, CaptureError, CaptureStream, PlaybackBackend, PlaybackError, PlaybackHandle,
};
use super::permission::{PermissionGate, PermissionState};

/// State of the recording machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// Nothing captured, no stream open
    Idle,

    /// Stream acquisition in flight
    Requesting,

    /// Hardware stream open, capture running
    Recording,

    /// A RecordingRef exists; nothing is playing
    Captured,

    /// The captured audio is playing
    Playing,

    /// Playback was paused by the user
    Paused,
}

/// Errors from recording operations
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Invalid transition from {from:?}: {action}")]
    InvalidTransition {
        from: RecordingState,
        action: &'static str,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Controller for microphone capture and playback of the captured note.
pub struct RecordingController {
    capture: Arc<dyn CaptureBackend>,
    playback: Arc<dyn PlaybackBackend>,
    gate: PermissionGate,
    state: RecordingState,
    stream: Option<Box<dyn CaptureStream>>,
    playing: Option<Box<dyn PlaybackHandle>>,
    recording: Option<RecordingRef>,
    elapsed_secs: Arc<AtomicU64>,
    timer: Option<JoinHandle<()>>,
}

impl RecordingController {
    /// Create a controller over the given backends.
    pub fn new(capture: Arc<dyn CaptureBackend>, playback: Arc<dyn PlaybackBackend>) -> Self {
        let gate = PermissionGate::new(capture.clone());
        Self {
            capture,
            playback,
            gate,
            state: RecordingState::Idle,
            stream: None,
            playing: None,
            recording: None,
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            timer: None,
        }
    }

    /// Current state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Elapsed recording time in whole seconds
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::Relaxed)
    }

    /// The captured recording, if one exists
    pub fn recording(&self) -> Option<&RecordingRef> {
        self.recording.as_ref()
    }

    /// Permission gate accessor
    pub fn permission(&mut self) -> &mut PermissionGate {
        &mut self.gate
    }

    /// Current permission state without touching the platform
    pub fn permission_state(&self) -> PermissionState {
        self.gate.state()
    }

    /// Start a new recording.
    ///
    /// If a previous recording exists it is deleted first. On successful
    /// acquisition the permission state becomes Granted and the duration
    /// timer starts; on failure the state returns to Idle, permission
    /// becomes Denied, and the classified error is returned.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        // Re-record: a leftover capture must go through the delete transition
        if self.state != RecordingState::Idle {
            self.delete();
        }

        self.state = RecordingState::Requesting;
        let backend = self.capture.clone();
        let opened = tokio::task::spawn_blocking(move || backend.open_stream())
            .await
            .unwrap_or_else(|err| Err(CaptureError::Other(err.to_string())));

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.gate.set(PermissionState::Granted);
                self.elapsed_secs.store(0, Ordering::Relaxed);
                self.start_timer();
                self.state = RecordingState::Recording;
                debug!(backend = self.capture.name(), "capture stream opened");
                Ok(())
            }
            Err(err) => {
                self.state = RecordingState::Idle;
                self.gate.set(PermissionState::Denied);
                warn!(error = %err, "capture stream acquisition failed");
                Err(err.into())
            }
        }
    }

    /// Stop the running recording, finalize it into a RecordingRef, and
    /// release the hardware stream.
    pub fn stop(&mut self) -> Result<RecordingRef, RecorderError> {
        if self.state != RecordingState::Recording {
            return Err(RecorderError::InvalidTransition {
                from: self.state,
                action: "stop",
            });
        }

        self.stop_timer();
        let stream = self.stream.take().ok_or_else(|| {
            CaptureError::Other("capture stream missing while recording".to_string())
        })?;

        // finalize releases the device; the in-use indicator clears here
        let audio = stream.finalize()?;
        let recording = RecordingRef::from_audio(audio);
        self.recording = Some(recording.clone());
        self.state = RecordingState::Captured;
        Ok(recording)
    }

    /// Play the captured recording.
    ///
    /// Any previously active playback unit is torn down first, so at most
    /// one is active afterwards.
    pub fn play(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecordingState::Captured | RecordingState::Paused | RecordingState::Playing => {}
            from => {
                return Err(RecorderError::InvalidTransition {
                    from,
                    action: "play",
                })
            }
        }

        let recording = self.recording.clone().ok_or_else(|| {
            CaptureError::Other("no captured recording to play".to_string())
        })?;

        if let Some(mut active) = self.playing.take() {
            active.stop();
        }

        let handle = self.playback.start(&recording.audio)?;
        self.playing = Some(handle);
        self.state = RecordingState::Playing;
        Ok(())
    }

    /// Pause active playback.
    pub fn pause(&mut self) {
        if self.state == RecordingState::Playing {
            if let Some(mut active) = self.playing.take() {
                active.stop();
            }
            self.state = RecordingState::Paused;
        }
    }

    /// Observe playback progress; a playback that reached its natural end
    /// moves the machine back to Captured.
    pub fn refresh(&mut self) {
        if self.state == RecordingState::Playing {
            let finished = self
                .playing
                .as_ref()
                .map(|h| h.is_finished())
                .unwrap_or(true);
            if finished {
                self.playing = None;
                self.state = RecordingState::Captured;
            }
        }
    }

    /// Delete the recording: stops any playback, releases all resources,
    /// and resets the duration counter to zero.
    pub fn delete(&mut self) {
        if let Some(mut active) = self.playing.take() {
            active.stop();
        }
        self.stop_timer();
        // Dropping a live stream guard releases the device
        self.stream = None;
        self.recording = None;
        self.elapsed_secs.store(0, Ordering::Relaxed);
        self.state = RecordingState::Idle;
    }

    fn start_timer(&mut self) {
        let counter = self.elapsed_secs.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
            // the first tick completes immediately
            tick.tick().await;
            loop {
                tick.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(mut active) = self.playing.take() {
            active.stop();
        }
        self.stop_timer();
        // stream guard drop releases the device, including mid-recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::{FakeCapture, FakePlayback};

    fn controller() -> (RecordingController, FakeCapture, FakePlayback) {
        let capture = FakeCapture::new();
        let playback = FakePlayback::new();
        let ctl = RecordingController::new(
            Arc::new(capture.clone()),
            Arc::new(playback.clone()),
        );
        (ctl, capture, playback)
    }

    #[tokio::test]
    async fn test_record_stop_releases_stream() {
        let (mut ctl, capture, _playback) = controller();

        ctl.start().await.unwrap();
        assert_eq!(ctl.state(), RecordingState::Recording);
        assert_eq!(capture.open_streams(), 1);
        assert_eq!(ctl.permission_state(), PermissionState::Granted);

        let rec = ctl.stop().unwrap();
        assert_eq!(ctl.state(), RecordingState::Captured);
        assert_eq!(capture.open_streams(), 0);
        assert!(rec.duration_secs > 0);
    }

    #[tokio::test]
    async fn test_acquisition_failure_classifies_and_denies() {
        let (mut ctl, capture, _playback) = controller();
        capture.fail_next(CaptureError::NoDevice);

        let err = ctl.start().await.unwrap_err();
        assert!(matches!(
            err,
            RecorderError::Capture(CaptureError::NoDevice)
        ));
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert_eq!(ctl.permission_state(), PermissionState::Denied);
        assert_eq!(capture.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_re_record_deletes_previous_capture() {
        let (mut ctl, _capture, _playback) = controller();

        ctl.start().await.unwrap();
        let first = ctl.stop().unwrap();

        ctl.start().await.unwrap();
        // the old RecordingRef went through the delete transition
        assert!(ctl.recording().is_none());
        assert_eq!(ctl.elapsed_secs(), 0);

        let second = ctl.stop().unwrap();
        assert!(ctl.recording().is_some());
        // both are valid, independent captures
        assert_eq!(first.mime_type, second.mime_type);
    }

    #[tokio::test]
    async fn test_single_playback_unit() {
        let (mut ctl, _capture, playback) = controller();

        ctl.start().await.unwrap();
        ctl.stop().unwrap();

        ctl.play().unwrap();
        assert_eq!(playback.active(), 1);

        // playing again tears the first unit down before starting the next
        ctl.play().unwrap();
        assert_eq!(playback.active(), 1);
        assert_eq!(playback.started_total(), 2);
    }

    #[tokio::test]
    async fn test_pause_and_natural_end() {
        let (mut ctl, _capture, playback) = controller();

        ctl.start().await.unwrap();
        ctl.stop().unwrap();

        ctl.play().unwrap();
        ctl.pause();
        assert_eq!(ctl.state(), RecordingState::Paused);
        assert_eq!(playback.active(), 0);

        ctl.play().unwrap();
        playback.finish_current();
        ctl.refresh();
        assert_eq!(ctl.state(), RecordingState::Captured);
        assert!(ctl.recording().is_some());
    }

    #[tokio::test]
    async fn test_delete_while_playing_stops_playback() {
        let (mut ctl, _capture, playback) = controller();

        ctl.start().await.unwrap();
        ctl.stop().unwrap();
        ctl.play().unwrap();
        assert_eq!(playback.active(), 1);

        ctl.delete();
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert_eq!(playback.active(), 0);
        assert!(ctl.recording().is_none());
        assert_eq!(ctl.elapsed_secs(), 0);
    }

    #[tokio::test]
    async fn test_drop_mid_recording_releases_stream() {
        let capture = FakeCapture::new();
        let playback = FakePlayback::new();
        {
            let mut ctl = RecordingController::new(
                Arc::new(capture.clone()),
                Arc::new(playback.clone()),
            );
            ctl.start().await.unwrap();
            assert_eq!(capture.open_streams(), 1);
        }
        assert_eq!(capture.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let (mut ctl, _capture, _playback) = controller();

        assert!(matches!(
            ctl.stop(),
            Err(RecorderError::InvalidTransition { .. })
        ));
        assert!(matches!(
            ctl.play(),
            Err(RecorderError::InvalidTransition { .. })
        ));

        // delete from idle is a harmless no-op
        ctl.delete();
        assert_eq!(ctl.state(), RecordingState::Idle);
    }
}
