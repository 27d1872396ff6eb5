//! Deterministic capture/playback backends for tests.
//!
//! Used by unit tests and the integration suites to drive the recording
//! state machine without audio hardware. Counters expose how many streams
//! and playback units are currently held, so resource-release guarantees
//! can be asserted directly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::domain::CapturedAudio;

use super::backend::{
    CaptureBackend, CaptureError, CaptureStream, PlaybackBackend, PlaybackError, PlaybackHandle,
};
use super::permission::PermissionState;

/// Build a silent 16 kHz mono capture of the given length.
pub fn fake_audio(secs: u64) -> CapturedAudio {
    CapturedAudio {
        wav: vec![0u8; 44 + (32_000 * secs) as usize],
        sample_rate: 16_000,
        channels: 1,
    }
}

struct FakeCaptureInner {
    probes: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
    opened_total: AtomicUsize,
    fail_next: Mutex<Option<CaptureError>>,
    reported: Mutex<Option<PermissionState>>,
    changes: watch::Sender<PermissionState>,
}

/// Capture backend that hands out silent streams and counts resource use.
#[derive(Clone)]
pub struct FakeCapture {
    inner: Arc<FakeCaptureInner>,
    capture_secs: u64,
}

impl FakeCapture {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(PermissionState::Unknown);
        Self {
            inner: Arc::new(FakeCaptureInner {
                probes: AtomicUsize::new(0),
                open_streams: Arc::new(AtomicUsize::new(0)),
                opened_total: AtomicUsize::new(0),
                fail_next: Mutex::new(None),
                reported: Mutex::new(None),
                changes,
            }),
            capture_secs: 2,
        }
    }

    /// Make the next probe or open fail with the given error.
    pub fn fail_next(&self, err: CaptureError) {
        *self.inner.fail_next.lock().unwrap() = Some(err);
    }

    /// Control what `query_permission` reports (None = cannot report).
    pub fn set_reported(&self, state: Option<PermissionState>) {
        *self.inner.reported.lock().unwrap() = state;
    }

    /// Emit an out-of-band permission change.
    pub fn notify_change(&self, state: PermissionState) {
        let _ = self.inner.changes.send(state);
    }

    /// Number of probes performed
    pub fn probes(&self) -> usize {
        self.inner.probes.load(Ordering::SeqCst)
    }

    /// Streams currently held open
    pub fn open_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::SeqCst)
    }

    /// Streams opened over the backend's lifetime
    pub fn opened_total(&self) -> usize {
        self.inner.opened_total.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<CaptureError> {
        self.inner.fail_next.lock().unwrap().take()
    }
}

impl Default for FakeCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for FakeCapture {
    fn name(&self) -> &str {
        "fake"
    }

    fn query_permission(&self) -> Option<PermissionState> {
        *self.inner.reported.lock().unwrap()
    }

    fn watch_permission(&self) -> Option<watch::Receiver<PermissionState>> {
        Some(self.inner.changes.subscribe())
    }

    fn probe(&self) -> Result<(), CaptureError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.inner.probes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_stream(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.inner.open_streams.fetch_add(1, Ordering::SeqCst);
        self.inner.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            open_streams: self.inner.open_streams.clone(),
            secs: self.capture_secs,
        }))
    }
}

struct FakeStream {
    open_streams: Arc<AtomicUsize>,
    secs: u64,
}

impl CaptureStream for FakeStream {
    fn finalize(self: Box<Self>) -> Result<CapturedAudio, CaptureError> {
        // the guard's Drop releases the counted stream
        Ok(fake_audio(self.secs))
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakePlaybackInner {
    active: Arc<AtomicUsize>,
    started_total: AtomicUsize,
    current_finished: Mutex<Option<Arc<AtomicBool>>>,
    fail_next: Mutex<Option<PlaybackError>>,
}

/// Playback backend that counts active units and can be finished on demand.
#[derive(Clone)]
pub struct FakePlayback {
    inner: Arc<FakePlaybackInner>,
}

impl FakePlayback {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakePlaybackInner {
                active: Arc::new(AtomicUsize::new(0)),
                started_total: AtomicUsize::new(0),
                current_finished: Mutex::new(None),
                fail_next: Mutex::new(None),
            }),
        }
    }

    /// Make the next start fail with the given error.
    pub fn fail_next(&self, err: PlaybackError) {
        *self.inner.fail_next.lock().unwrap() = Some(err);
    }

    /// Playback units currently active
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Units started over the backend's lifetime
    pub fn started_total(&self) -> usize {
        self.inner.started_total.load(Ordering::SeqCst)
    }

    /// Mark the most recently started unit as naturally finished.
    pub fn finish_current(&self) {
        if let Some(flag) = self.inner.current_finished.lock().unwrap().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

impl Default for FakePlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackBackend for FakePlayback {
    fn name(&self) -> &str {
        "fake"
    }

    fn start(&self, _audio: &CapturedAudio) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        if let Some(err) = self.inner.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        self.inner.started_total.fetch_add(1, Ordering::SeqCst);

        let finished = Arc::new(AtomicBool::new(false));
        *self.inner.current_finished.lock().unwrap() = Some(finished.clone());

        Ok(Box::new(FakeHandle {
            active: self.inner.active.clone(),
            finished,
            stopped: false,
        }))
    }
}

struct FakeHandle {
    active: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    stopped: bool,
}

impl FakeHandle {
    fn release(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl PlaybackHandle for FakeHandle {
    fn stop(&mut self) {
        self.release();
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.release();
    }
}
