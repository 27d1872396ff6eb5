//! Adapter interfaces for external systems.
//!
//! Adapters provide a unified interface to the external collaborators of
//! the pipeline: the submission endpoint and the ad-platform conversion
//! sinks.

pub mod endpoint;
pub mod google;
pub mod meta;
pub mod reporter;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{
    AttachmentMeta, EnquiryType, FieldSnapshot, RecordingMeta, StagedSubmission, SubmissionResult,
};

// Re-export the production adapters
pub use endpoint::{HttpSubmissionClient, FALLBACK_FAILURE_MESSAGE};
pub use google::{GoogleAdsConfig, GoogleAdsSink};
pub use meta::{MetaCapiConfig, MetaCapiSink};
pub use reporter::{
    ConversionIdentity, ConversionReporter, ConversionResult, PlatformOutcome, PlatformSelector,
};

/// Payload delivered to the submission endpoint.
///
/// Carries the field snapshot and binary metadata; opaque binary handles
/// never cross the wire.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    /// Local staging id, for server-side correlation
    pub staged_id: String,

    #[serde(flatten)]
    pub fields: FieldSnapshot,

    pub attachments: Vec<AttachmentMeta>,

    pub recording: Option<RecordingMeta>,
}

impl SubmissionPayload {
    /// Build the wire payload from a staged record.
    pub fn from_staged(staged: &StagedSubmission) -> Self {
        Self {
            staged_id: staged.id.clone(),
            fields: staged.fields.clone(),
            attachments: staged.attachments.clone(),
            recording: staged.recording.clone(),
        }
    }
}

/// Trait for the submission endpoint
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Human-readable endpoint name
    fn name(&self) -> &str;

    /// One-time activation work (e.g. the CSRF token side-channel fetch)
    async fn activate(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver the payload. Transport failures are normalized into a
    /// `SubmissionResult::Failure`; this never errors.
    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionResult;
}

/// A normalized conversion event dispatched to the ad platforms.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionEvent {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub enquiry_type: Option<EnquiryType>,
    pub occurred_at: DateTime<Utc>,
}

/// Trait for an ad-platform conversion sink
#[async_trait]
pub trait ConversionSink: Send + Sync {
    /// Platform key ("google", "meta")
    fn platform(&self) -> &str;

    /// Dispatch one conversion event
    async fn send(&self, event: &ConversionEvent) -> Result<()>;
}

/// SHA-256 of a normalized (trimmed, lowercased) identity value, as both
/// platforms require for user-identity fields.
pub(crate) fn hashed_identifier(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
