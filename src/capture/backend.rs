//! Platform seams for audio capture and playback.
//!
//! The recording state machine talks to the hardware through these traits
//! so it can be driven in tests without a device. The production
//! implementations live in `device` (cpal) and `playback` (rodio); both
//! keep the non-Send platform stream on a dedicated thread, which is why
//! the traits are synchronous.

use thiserror::Error;
use tokio::sync::watch;

use crate::domain::CapturedAudio;

use super::permission::PermissionState;

/// Capture failures, classified by cause.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Microphone access was refused")]
    PermissionRefused,

    #[error("No capture device is present")]
    NoDevice,

    #[error("Audio capture is not supported on this platform")]
    Unsupported,

    #[error("Capture failed: {0}")]
    Other(String),
}

/// Playback failures.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    #[error("No playback device is available")]
    NoDevice,

    #[error("Playback failed: {0}")]
    Other(String),
}

/// Source of hardware audio input.
pub trait CaptureBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Best-effort permission state; None when the platform cannot report it.
    fn query_permission(&self) -> Option<PermissionState>;

    /// Out-of-band permission change notifications, when supported.
    fn watch_permission(&self) -> Option<watch::Receiver<PermissionState>> {
        None
    }

    /// Open and immediately close an input stream, purely to trigger the
    /// platform consent dialog.
    fn probe(&self) -> Result<(), CaptureError>;

    /// Open the hardware stream and begin capturing.
    fn open_stream(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A live hardware capture stream.
///
/// Dropping the stream must release the underlying device on every exit
/// path, including abrupt teardown mid-recording.
pub trait CaptureStream: Send {
    /// Stop capturing, release the device, and finalize the audio.
    fn finalize(self: Box<Self>) -> Result<CapturedAudio, CaptureError>;
}

/// Renders captured audio as sound.
pub trait PlaybackBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Begin playing the captured audio, returning a control handle.
    fn start(&self, audio: &CapturedAudio) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// Handle to one active playback unit.
pub trait PlaybackHandle: Send {
    /// Stop playback and release the output device.
    fn stop(&mut self);

    /// Whether playback reached its natural end.
    fn is_finished(&self) -> bool;
}
