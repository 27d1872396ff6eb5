//! Intake pipeline orchestration.
//!
//! Coordinates the submit flow: full validation, durable staging (which
//! happens-before any network call), best-effort binary encoding,
//! independent conversion reporting, endpoint delivery, and the terminal
//! UI state with its delayed form reset.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::adapters::{
    ConversionIdentity, ConversionReporter, PlatformSelector, SubmissionApi, SubmissionPayload,
};
use crate::domain::{Field, StagedSubmission, SubmissionResult};

use super::session::{SessionStatus, SharedSession};
use super::staging::StagingStore;
use super::validate::{validate, ValidationErrors, ValidationProfile};

/// Outcome of a submit attempt.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Validation failed; nothing was staged or sent
    Rejected(ValidationErrors),

    /// The submission client ran and produced a result
    Completed(SubmissionResult),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(result) if result.is_success())
    }
}

/// Main intake pipeline
pub struct IntakePipeline {
    staging: Arc<StagingStore>,
    api: Arc<dyn SubmissionApi>,
    reporter: Arc<ConversionReporter>,
    profile: ValidationProfile,
    platforms: PlatformSelector,
    reset_delay: Duration,
}

impl IntakePipeline {
    /// Create a pipeline over its collaborators.
    pub fn new(
        staging: Arc<StagingStore>,
        api: Arc<dyn SubmissionApi>,
        reporter: Arc<ConversionReporter>,
    ) -> Self {
        Self {
            staging,
            api,
            reporter,
            profile: ValidationProfile::default(),
            platforms: PlatformSelector::Both,
            reset_delay: Duration::from_secs(5),
        }
    }

    /// Override the validation profile.
    pub fn with_profile(mut self, profile: ValidationProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Override the conversion platform selection.
    pub fn with_platforms(mut self, platforms: PlatformSelector) -> Self {
        self.platforms = platforms;
        self
    }

    /// Override the delay before a confirmed form resets.
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// The staging store this pipeline writes to.
    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// One-time activation (CSRF token side channel).
    pub async fn activate(&self) -> Result<()> {
        self.api.activate().await
    }

    /// Run the full submit flow for a session.
    #[instrument(skip(self, session), fields(endpoint = self.api.name()))]
    pub async fn submit(&self, session: &SharedSession) -> Result<SubmitOutcome> {
        // Full validation pass; field errors block before any staging
        let form = {
            let mut guard = session.lock().await;
            let errors = validate(guard.form(), &self.profile, guard.limits());
            if !errors.is_empty() {
                guard.apply_errors(errors.clone());
                return Ok(SubmitOutcome::Rejected(errors));
            }
            guard.form().clone()
        };

        // Durability precedes network risk: the metadata record is on disk
        // before the submission client runs. A staging failure is logged
        // and the submission proceeds without durable backup.
        let record = match self.staging.stage(&form).await {
            Ok(record) => {
                self.staging.spawn_encodings(&record.id, &form);
                record
            }
            Err(err) => {
                warn!(error = %err, "staging failed; proceeding without durable backup");
                StagedSubmission::from_form(&form)
            }
        };

        // Conversion reporting happens after staging and is independent of
        // the submission result in both directions.
        let reporter = self.reporter.clone();
        let identity = ConversionIdentity::from_contact(&form.name, &form.email, None);
        let enquiry_type = form.enquiry_type;
        let platforms = self.platforms;
        tokio::spawn(async move {
            reporter.report(identity, enquiry_type, platforms).await;
        });

        let payload = SubmissionPayload::from_staged(&record);
        let result = self.api.submit(&payload).await;

        match &result {
            SubmissionResult::Success { id, message } => {
                info!(id = %id, staged = %record.id, "submission accepted");
                let mut guard = session.lock().await;
                guard.mark_confirmed(id.clone(), message.clone());
                drop(guard);
                self.schedule_reset(session.clone());
            }
            SubmissionResult::Failure {
                message,
                field_errors,
                code,
            } => {
                warn!(code = ?code, "submission failed: {}", message);
                let mut guard = session.lock().await;
                for field_error in field_errors {
                    if let Some(field) = Field::from_key(&field_error.path) {
                        guard.set_field_error(field, field_error.message.clone());
                    }
                }
                guard.mark_failed(message.clone());
            }
        }

        Ok(SubmitOutcome::Completed(result))
    }

    /// After a confirmation, reset the form once the delay elapses (unless
    /// the session has already moved on).
    fn schedule_reset(&self, session: SharedSession) {
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut guard = session.lock().await;
            if matches!(guard.status(), SessionStatus::Confirmed { .. }) {
                guard.reset();
            }
        });
    }
}
