//! Form session: state, field errors, and the attachment manager.
//!
//! All FormState mutation goes through the session. Every setter clears
//! that field's error (the cheap per-edit pass); the full validation pass
//! runs only at submit, in the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::capture::{PermissionState, RecordingController};
use crate::domain::{AttachmentRef, EnquiryType, Field, FormState};

use super::limits::IntakeLimits;
use super::validate::ValidationErrors;

/// Terminal-state surface the UI renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// The form is being edited
    Editing,

    /// The submission was accepted; a confirmation is showing
    Confirmed { id: String, message: String },

    /// The submission failed; an error banner is showing
    Failed { message: String },
}

/// One user's in-progress enquiry.
pub struct FormSession {
    form: FormState,
    errors: ValidationErrors,
    recorder: RecordingController,
    limits: IntakeLimits,
    status: SessionStatus,
}

/// Session shared between the pipeline and its background tasks.
pub type SharedSession = Arc<tokio::sync::Mutex<FormSession>>;

impl FormSession {
    /// Create a session with default form state.
    pub fn new(recorder: RecordingController, limits: IntakeLimits) -> Self {
        Self {
            form: FormState::default(),
            errors: ValidationErrors::new(),
            recorder,
            limits,
            status: SessionStatus::Editing,
        }
    }

    /// Wrap a session for sharing with background tasks.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn limits(&self) -> &IntakeLimits {
        &self.limits
    }

    // ------------------------------------------------------------------
    // Text field setters (each clears its own error)
    // ------------------------------------------------------------------

    pub fn set_name(&mut self, value: impl Into<String>) {
        self.form.name = value.into();
        self.errors.remove(&Field::Name);
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.form.email = value.into();
        self.errors.remove(&Field::Email);
    }

    pub fn set_enquiry_type(&mut self, value: Option<EnquiryType>) {
        self.form.enquiry_type = value;
        self.errors.remove(&Field::EnquiryType);
    }

    pub fn set_subject(&mut self, value: impl Into<String>) {
        self.form.subject = value.into();
        self.errors.remove(&Field::Subject);
    }

    pub fn set_message(&mut self, value: impl Into<String>) {
        self.form.message = value.into();
        self.errors.remove(&Field::Message);
    }

    // ------------------------------------------------------------------
    // Attachment manager
    // ------------------------------------------------------------------

    /// Add attachment candidates.
    ///
    /// Candidates over the per-item size limit are rejected and reported
    /// as a field error; survivors are appended and the combined list is
    /// capped, existing items taking priority (overflow is silently
    /// dropped from the candidate batch).
    pub fn add_files(&mut self, candidates: &[PathBuf]) {
        self.errors.remove(&Field::Attachments);

        let mut rejected: Vec<String> = Vec::new();
        for path in candidates {
            let candidate = match AttachmentRef::from_path(path) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "attachment unreadable");
                    rejected.push(path.file_name().unwrap_or_default().to_string_lossy().to_string());
                    continue;
                }
            };

            if self
                .limits
                .check_attachment_size(&candidate.name, candidate.size_bytes)
                .is_err()
            {
                rejected.push(candidate.name);
                continue;
            }

            if self.form.attachments.len() < self.limits.max_attachments {
                self.form.attachments.push(candidate);
            }
        }

        if !rejected.is_empty() {
            let limit_mib = self.limits.max_attachment_bytes / (1024 * 1024);
            self.errors.insert(
                Field::Attachments,
                format!(
                    "Some files could not be attached (over the {} MiB limit): {}",
                    limit_mib,
                    rejected.join(", ")
                ),
            );
        }
    }

    /// Remove one attachment by position; out-of-range is a no-op.
    pub fn remove_attachment(&mut self, index: usize) {
        if index < self.form.attachments.len() {
            self.form.attachments.remove(index);
            self.errors.remove(&Field::Attachments);
        }
    }

    // ------------------------------------------------------------------
    // Recording wiring
    // ------------------------------------------------------------------

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut RecordingController {
        &mut self.recorder
    }

    /// Start (or re-start) recording; acquisition errors become a
    /// recording field error.
    pub async fn start_recording(&mut self) -> bool {
        self.errors.remove(&Field::Recording);
        self.form.recording = None;

        match self.recorder.start().await {
            Ok(()) => true,
            Err(err) => {
                self.errors.insert(Field::Recording, err.to_string());
                false
            }
        }
    }

    /// Stop recording and attach the captured note to the form.
    pub fn stop_recording(&mut self) {
        match self.recorder.stop() {
            Ok(recording) => {
                self.form.recording = Some(recording);
            }
            Err(err) => {
                self.errors.insert(Field::Recording, err.to_string());
            }
        }
    }

    pub fn play_recording(&mut self) {
        if let Err(err) = self.recorder.play() {
            self.errors.insert(Field::Recording, err.to_string());
        }
    }

    pub fn pause_recording(&mut self) {
        self.recorder.pause();
    }

    /// Observe playback progress (natural end returns to Captured).
    pub fn poll_playback(&mut self) {
        self.recorder.refresh();
    }

    /// Delete the recording and clear its field error.
    pub fn delete_recording(&mut self) {
        self.recorder.delete();
        self.form.recording = None;
        self.errors.remove(&Field::Recording);
    }

    /// Request microphone permission; clears any prior recording error.
    pub async fn request_permission(&mut self) -> PermissionState {
        self.errors.remove(&Field::Recording);
        self.recorder.permission().request().await
    }

    /// Recording controls are disabled once permission is denied.
    pub fn recording_controls_enabled(&self) -> bool {
        self.recorder.permission_state() != PermissionState::Denied
    }

    // ------------------------------------------------------------------
    // Validation / status wiring
    // ------------------------------------------------------------------

    /// Merge errors from a full validation pass into the field map.
    pub fn apply_errors(&mut self, errors: ValidationErrors) {
        self.errors.extend(errors);
    }

    pub fn set_field_error(&mut self, field: Field, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    pub fn mark_confirmed(&mut self, id: impl Into<String>, message: impl Into<String>) {
        self.status = SessionStatus::Confirmed {
            id: id.into(),
            message: message.into(),
        };
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Failed {
            message: message.into(),
        };
    }

    /// Dismiss the error banner without touching entered values.
    pub fn dismiss_banner(&mut self) {
        if matches!(self.status, SessionStatus::Failed { .. }) {
            self.status = SessionStatus::Editing;
        }
    }

    /// Reset to defaults (after a confirmed submission).
    pub fn reset(&mut self) {
        self.recorder.delete();
        self.form = FormState::default();
        self.errors.clear();
        self.status = SessionStatus::Editing;
    }
}
