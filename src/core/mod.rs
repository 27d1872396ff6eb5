//! Core pipeline logic.
//!
//! This module contains:
//! - Session: FormState ownership, field errors, attachment manager
//! - Validate: the submit-time validation pass
//! - Staging: durable staging store with best-effort binary encoding
//! - Limits: content bounds and retention settings
//! - Pipeline: the submit orchestration

pub mod limits;
pub mod pipeline;
pub mod session;
pub mod staging;
pub mod validate;

// Re-export commonly used types
pub use limits::{IntakeLimits, LimitViolation};
pub use pipeline::{IntakePipeline, SubmitOutcome};
pub use session::{FormSession, SessionStatus, SharedSession};
pub use staging::{StagingError, StagingStore};
pub use validate::{validate, ValidationErrors, ValidationProfile};
