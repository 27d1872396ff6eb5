//! Domain types for the intake pipeline.
//!
//! This module contains the core data structures:
//! - Form: FormState and the binary-content references it holds
//! - Submission: Staged records and the result envelope
//! - Icon: Field glyph lookup for terminal rendering

pub mod form;
pub mod icon;
pub mod submission;

// Re-export commonly used types
pub use form::{AttachmentRef, CapturedAudio, EnquiryType, Field, FormState, RecordingRef};
pub use icon::FieldGlyph;
pub use submission::{
    attachment_slot, generate_submission_id, AttachmentMeta, FieldError, FieldSnapshot,
    RecordingMeta, StagedSubmission, SubmissionResult, RECORDING_SLOT,
};
