//! Staged submission records and the submission result envelope.
//!
//! A StagedSubmission is written append-only before any network delivery
//! is attempted and is never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::form::{EnquiryType, FormState};

/// Slot key for the recording payload side file.
pub const RECORDING_SLOT: &str = "recording";

/// Slot key for the attachment at `index`.
pub fn attachment_slot(index: usize) -> String {
    format!("attachment_{}", index)
}

/// Generate a time-based submission id token.
///
/// Format: "sub-{unix_millis_hex}-{entropy}". Ordering within the same
/// millisecond is not guaranteed and nothing relies on it.
pub fn generate_submission_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let entropy = Uuid::new_v4().simple().to_string();
    format!("sub-{:x}-{}", millis, &entropy[..6])
}

/// Shallow copy of the text fields at staging time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub name: String,
    pub email: String,
    pub enquiry_type: Option<EnquiryType>,
    pub subject: String,
    pub message: String,
}

impl FieldSnapshot {
    /// Snapshot the text fields of a form.
    pub fn of(form: &FormState) -> Self {
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            enquiry_type: form.enquiry_type,
            subject: form.subject.clone(),
            message: form.message.clone(),
        }
    }
}

/// Per-attachment metadata captured at staging time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Recording metadata captured at staging time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub size_bytes: u64,
    pub mime_type: String,
    pub duration_secs: u64,
}

/// One durably staged submission record.
///
/// The metadata record is written synchronously; binary payloads are
/// encoded into per-slot side files by best-effort background tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedSubmission {
    /// Time-based token identifying this submission
    pub id: String,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// Text field snapshot
    pub fields: FieldSnapshot,

    /// Attachment metadata in list order
    pub attachments: Vec<AttachmentMeta>,

    /// Recording metadata, if a voice note was captured
    pub recording: Option<RecordingMeta>,
}

impl StagedSubmission {
    /// Build a record from the current form state with a fresh id.
    pub fn from_form(form: &FormState) -> Self {
        Self {
            id: generate_submission_id(),
            created_at: Utc::now(),
            fields: FieldSnapshot::of(form),
            attachments: form
                .attachments
                .iter()
                .map(|a| AttachmentMeta {
                    name: a.name.clone(),
                    size_bytes: a.size_bytes,
                    mime_type: a.mime_type.clone(),
                    last_modified: a.last_modified,
                })
                .collect(),
            recording: form.recording.as_ref().map(|r| RecordingMeta {
                size_bytes: r.size_bytes(),
                mime_type: r.mime_type.clone(),
                duration_secs: r.duration_secs,
            }),
        }
    }
}

/// A field-scoped error reported by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub path: String,
    pub message: String,
}

/// Normalized outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// The endpoint accepted the submission
    Success { id: String, message: String },

    /// The endpoint rejected it, or transport failed
    Failure {
        message: String,
        field_errors: Vec<FieldError>,
        code: Option<String>,
    },
}

impl SubmissionResult {
    /// Whether this result represents an accepted submission
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The human-readable message carried by either arm
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } => message,
            Self::Failure { message, .. } => message,
        }
    }
}
