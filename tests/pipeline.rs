//! End-to-end submit flow tests.
//!
//! Drives the full pipeline with a scripted endpoint, fake audio backends,
//! and a temp-dir staging store.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use intake::adapters::{ConversionEvent, ConversionReporter, ConversionSink, PlatformSelector};
use intake::core::{IntakePipeline, SessionStatus, StagingStore, SubmitOutcome};
use intake::domain::Field;

use common::{fake_session, fill_valid_form, RecordingApi};

async fn staging_in(temp: &TempDir) -> Arc<StagingStore> {
    Arc::new(StagingStore::open(temp.path(), 100).await.unwrap())
}

#[tokio::test]
async fn invalid_form_produces_field_errors_and_no_staging() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::success(staging.records_path().to_path_buf()));
    let pipeline = IntakePipeline::new(staging.clone(), api.clone(), Arc::new(ConversionReporter::new()));

    let (session, _capture, _playback) = fake_session();
    {
        let mut guard = session.lock().await;
        guard.set_name("");
        guard.set_email("a@b.com");
        guard.set_message("short");
    }

    let outcome = pipeline.submit(&session).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Rejected(_)));

    let guard = session.lock().await;
    assert!(guard.errors().contains_key(&Field::Name));
    assert!(guard.errors().contains_key(&Field::Message));
    assert!(!guard.errors().contains_key(&Field::Email));
    drop(guard);

    assert!(staging.list().await.unwrap().is_empty());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn valid_form_stages_submits_confirms_and_resets() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::success(staging.records_path().to_path_buf()));
    let pipeline = IntakePipeline::new(staging.clone(), api.clone(), Arc::new(ConversionReporter::new()))
        .with_reset_delay(Duration::from_millis(50));

    let (session, _capture, _playback) = fake_session();
    fill_valid_form(&session).await;

    let outcome = pipeline.submit(&session).await.unwrap();
    assert!(outcome.is_success());

    // exactly one staged record, matching what went over the wire
    let records = staging.list().await.unwrap();
    assert_eq!(records.len(), 1);
    let calls = api.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].staged_id, records[0].id);

    {
        let guard = session.lock().await;
        assert!(matches!(
            guard.status(),
            SessionStatus::Confirmed { id, .. } if id == "enq-100"
        ));
    }

    // the confirmation resets the form after the configured delay
    tokio::time::sleep(Duration::from_millis(150)).await;
    let guard = session.lock().await;
    assert_eq!(*guard.status(), SessionStatus::Editing);
    assert!(guard.form().name.is_empty());
    assert!(guard.form().message.is_empty());
}

#[tokio::test]
async fn staging_metadata_is_durable_before_the_endpoint_is_invoked() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::success(staging.records_path().to_path_buf()));
    let pipeline = IntakePipeline::new(staging, api.clone(), Arc::new(ConversionReporter::new()));

    let (session, _capture, _playback) = fake_session();
    fill_valid_form(&session).await;
    pipeline.submit(&session).await.unwrap();

    let calls = api.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert!(
        calls[0].staged_was_durable,
        "the staged record must be readable before the network call"
    );
}

#[tokio::test]
async fn failure_envelope_message_reaches_the_banner_verbatim() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::failure(
        staging.records_path().to_path_buf(),
        "Duplicate submission",
    ));
    let pipeline = IntakePipeline::new(staging.clone(), api, Arc::new(ConversionReporter::new()))
        .with_reset_delay(Duration::from_millis(50));

    let (session, _capture, _playback) = fake_session();
    fill_valid_form(&session).await;

    let outcome = pipeline.submit(&session).await.unwrap();
    assert!(!outcome.is_success());

    // staged even though delivery failed
    assert_eq!(staging.list().await.unwrap().len(), 1);

    // no reset happens on failure; values survive
    tokio::time::sleep(Duration::from_millis(150)).await;
    let guard = session.lock().await;
    assert_eq!(
        *guard.status(),
        SessionStatus::Failed {
            message: "Duplicate submission".to_string()
        }
    );
    assert_eq!(guard.form().email, "jane@example.com");
}

struct CountingSink {
    platform: &'static str,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ConversionSink for CountingSink {
    fn platform(&self) -> &str {
        self.platform
    }

    async fn send(&self, _event: &ConversionEvent) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("sink offline")
        }
        Ok(())
    }
}

#[tokio::test]
async fn conversion_reporting_runs_even_when_submission_fails() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::failure(
        staging.records_path().to_path_buf(),
        "Server exploded",
    ));

    let google_calls = Arc::new(AtomicUsize::new(0));
    let meta_calls = Arc::new(AtomicUsize::new(0));
    let reporter = ConversionReporter::new()
        .with_sink(Arc::new(CountingSink {
            platform: "google",
            fail: true,
            calls: google_calls.clone(),
        }))
        .with_sink(Arc::new(CountingSink {
            platform: "meta",
            fail: false,
            calls: meta_calls.clone(),
        }));

    let pipeline = IntakePipeline::new(staging, api, Arc::new(reporter))
        .with_platforms(PlatformSelector::Both);

    let (session, _capture, _playback) = fake_session();
    fill_valid_form(&session).await;

    let outcome = pipeline.submit(&session).await.unwrap();
    assert!(!outcome.is_success());

    // the report is spawned independently; give it a moment to land
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(google_calls.load(Ordering::SeqCst), 1);
    assert_eq!(meta_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submission_with_recording_carries_its_metadata() {
    let temp = TempDir::new().unwrap();
    let staging = staging_in(&temp).await;
    let api = Arc::new(RecordingApi::success(staging.records_path().to_path_buf()));
    let pipeline = IntakePipeline::new(staging.clone(), api, Arc::new(ConversionReporter::new()));

    let (session, capture, _playback) = fake_session();
    fill_valid_form(&session).await;

    {
        let mut guard = session.lock().await;
        assert!(guard.start_recording().await);
        guard.stop_recording();
        assert!(guard.form().recording.is_some());
    }
    assert_eq!(capture.open_streams(), 0);

    pipeline.submit(&session).await.unwrap();

    let records = staging.list().await.unwrap();
    let recording = records[0].recording.as_ref().unwrap();
    assert_eq!(recording.mime_type, "audio/wav");
    assert!(recording.duration_secs > 0);
}
