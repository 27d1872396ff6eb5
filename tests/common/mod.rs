//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use intake::adapters::{SubmissionApi, SubmissionPayload};
use intake::capture::test_support::{FakeCapture, FakePlayback};
use intake::capture::RecordingController;
use intake::core::{FormSession, IntakeLimits, SharedSession};
use intake::domain::{EnquiryType, SubmissionResult};

/// A session driven by the fake audio backends.
pub fn fake_session() -> (SharedSession, FakeCapture, FakePlayback) {
    let capture = FakeCapture::new();
    let playback = FakePlayback::new();
    let recorder =
        RecordingController::new(Arc::new(capture.clone()), Arc::new(playback.clone()));
    let session = FormSession::new(recorder, IntakeLimits::default()).into_shared();
    (session, capture, playback)
}

/// Fill the session with the fields of a valid enquiry.
pub async fn fill_valid_form(session: &SharedSession) {
    let mut guard = session.lock().await;
    guard.set_name("Jane Doe");
    guard.set_email("jane@example.com");
    guard.set_enquiry_type(Some(EnquiryType::Project));
    guard.set_subject("New app");
    guard.set_message("We need a mobile app for logistics tracking.");
}

/// Scripted submission endpoint that also records, at the moment it is
/// invoked, whether the staged metadata record was already durable.
pub struct RecordingApi {
    result: SubmissionResult,
    records_path: PathBuf,
    pub calls: Mutex<Vec<SubmitCall>>,
}

#[derive(Debug, Clone)]
pub struct SubmitCall {
    pub staged_id: String,
    pub staged_was_durable: bool,
}

impl RecordingApi {
    pub fn success(records_path: PathBuf) -> Self {
        Self {
            result: SubmissionResult::Success {
                id: "enq-100".to_string(),
                message: "Thanks! Your enquiry has been received.".to_string(),
            },
            records_path,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failure(records_path: PathBuf, message: &str) -> Self {
        Self {
            result: SubmissionResult::Failure {
                message: message.to_string(),
                field_errors: Vec::new(),
                code: None,
            },
            records_path,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SubmissionApi for RecordingApi {
    fn name(&self) -> &str {
        "recording"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionResult {
        let durable = std::fs::read_to_string(&self.records_path)
            .map(|log| log.contains(&payload.staged_id))
            .unwrap_or(false);

        self.calls.lock().unwrap().push(SubmitCall {
            staged_id: payload.staged_id.clone(),
            staged_was_durable: durable,
        });
        self.result.clone()
    }
}
