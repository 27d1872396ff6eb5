//! Recording state machine and attachment manager scenarios.

mod common;

use std::fs::File;
use std::path::PathBuf;

use tempfile::TempDir;

use intake::capture::{CaptureError, PermissionState, RecordingState};
use intake::domain::Field;

use common::fake_session;

fn file_of_size(dir: &TempDir, name: &str, size: u64) -> PathBuf {
    let path = dir.path().join(name);
    let file = File::create(&path).unwrap();
    file.set_len(size).unwrap();
    path
}

#[tokio::test]
async fn six_file_batch_caps_the_list_at_five() {
    let (session, _capture, _playback) = fake_session();
    let dir = TempDir::new().unwrap();

    let batch: Vec<PathBuf> = (0..6)
        .map(|i| file_of_size(&dir, &format!("doc{}.pdf", i), 1024 * 1024))
        .collect();

    let mut guard = session.lock().await;
    guard.add_files(&batch);
    assert_eq!(guard.form().attachments.len(), 5);
}

#[tokio::test]
async fn oversized_files_never_grow_the_list() {
    let (session, _capture, _playback) = fake_session();
    let dir = TempDir::new().unwrap();

    let big = file_of_size(&dir, "huge.zip", 11 * 1024 * 1024);

    let mut guard = session.lock().await;
    guard.add_files(&[big]);
    assert!(guard.form().attachments.is_empty());
    assert!(guard.errors().get(&Field::Attachments).unwrap().contains("huge.zip"));
}

#[tokio::test]
async fn permission_denied_disables_recording_and_leaves_no_stream() {
    let (session, capture, _playback) = fake_session();
    capture.fail_next(CaptureError::PermissionRefused);

    let mut guard = session.lock().await;
    assert!(!guard.start_recording().await);

    assert_eq!(guard.recorder().state(), RecordingState::Idle);
    assert_eq!(guard.recorder().permission_state(), PermissionState::Denied);
    assert!(!guard.recording_controls_enabled());
    assert!(guard.errors().contains_key(&Field::Recording));
    drop(guard);

    assert_eq!(capture.open_streams(), 0);
}

#[tokio::test]
async fn stopping_always_releases_the_hardware_stream() {
    let (session, capture, _playback) = fake_session();

    let mut guard = session.lock().await;
    assert!(guard.start_recording().await);
    assert_eq!(capture.open_streams(), 1);

    guard.stop_recording();
    assert_eq!(guard.recorder().state(), RecordingState::Captured);
    drop(guard);

    assert_eq!(capture.open_streams(), 0);
}

#[tokio::test]
async fn re_recording_first_deletes_the_previous_capture() {
    let (session, capture, _playback) = fake_session();

    let mut guard = session.lock().await;
    assert!(guard.start_recording().await);
    guard.stop_recording();
    assert!(guard.form().recording.is_some());

    // starting again goes through the delete transition first
    assert!(guard.start_recording().await);
    assert!(guard.form().recording.is_none());
    assert_eq!(guard.recorder().state(), RecordingState::Recording);

    guard.stop_recording();
    assert!(guard.form().recording.is_some());
    drop(guard);

    assert_eq!(capture.open_streams(), 0);
    assert_eq!(capture.opened_total(), 2);
}

#[tokio::test]
async fn playback_is_exclusive_and_delete_stops_it() {
    let (session, _capture, playback) = fake_session();

    let mut guard = session.lock().await;
    assert!(guard.start_recording().await);
    guard.stop_recording();

    guard.play_recording();
    assert_eq!(guard.recorder().state(), RecordingState::Playing);
    assert_eq!(playback.active(), 1);

    // a second play tears down the first unit before starting another
    guard.play_recording();
    assert_eq!(playback.active(), 1);
    assert_eq!(playback.started_total(), 2);

    guard.delete_recording();
    assert_eq!(guard.recorder().state(), RecordingState::Idle);
    assert_eq!(playback.active(), 0);
    assert!(guard.form().recording.is_none());
}

#[tokio::test]
async fn natural_playback_end_returns_to_captured() {
    let (session, _capture, playback) = fake_session();

    let mut guard = session.lock().await;
    assert!(guard.start_recording().await);
    guard.stop_recording();
    guard.play_recording();

    playback.finish_current();
    guard.poll_playback();

    assert_eq!(guard.recorder().state(), RecordingState::Captured);
    assert!(guard.form().recording.is_some());
    assert_eq!(playback.active(), 0);
}

#[tokio::test]
async fn requesting_permission_clears_the_recording_error() {
    let (session, capture, _playback) = fake_session();

    // first acquisition fails and attaches an error
    capture.fail_next(CaptureError::NoDevice);
    let mut guard = session.lock().await;
    assert!(!guard.start_recording().await);
    assert!(guard.errors().contains_key(&Field::Recording));

    // a successful permission request clears it
    let state = guard.request_permission().await;
    assert_eq!(state, PermissionState::Granted);
    assert!(!guard.errors().contains_key(&Field::Recording));
}
