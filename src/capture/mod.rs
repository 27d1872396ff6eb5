//! Microphone capture, playback, and the permission gate.
//!
//! The recording state machine (`recorder`) drives platform audio through
//! the trait seams in `backend`; `device` and `playback` are the cpal and
//! rodio production implementations, and `test_support` ships
//! deterministic fakes for tests.

pub mod backend;
pub mod device;
pub mod permission;
pub mod playback;
pub mod recorder;
pub mod test_support;

pub use backend::{
    CaptureBackend, CaptureError, CaptureStream, PlaybackBackend, PlaybackError, PlaybackHandle,
};
pub use device::CpalCaptureBackend;
pub use permission::{PermissionGate, PermissionState};
pub use playback::RodioPlaybackBackend;
pub use recorder::{RecorderError, RecordingController, RecordingState};
