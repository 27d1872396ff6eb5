//! intake - Multi-modal inquiry intake pipeline
//!
//! Captures structured text fields, file attachments, and an optional
//! microphone recording; validates them; durably stages the payload before
//! any network risk; submits to an external endpoint; and reports
//! conversion events to two ad platforms independently of the submission
//! outcome.
//!
//! # Architecture
//!
//! The pipeline is built around a durability-first submit flow:
//! - A staged metadata record is written before the network call
//! - Binary payloads are encoded by best-effort background tasks, one
//!   side file per slot
//! - Conversion reporting runs after staging and never blocks on (or is
//!   blocked by) the submission result
//!
//! # Modules
//!
//! - `adapters`: External collaborators (submission endpoint, ad sinks)
//! - `capture`: Microphone permission, recording, and playback
//! - `core`: Session, validation, staging, and submit orchestration
//! - `domain`: Data structures (FormState, StagedSubmission, ...)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Submit an enquiry
//! intake submit --name "Jane Doe" --email jane@example.com \
//!     --type project --subject "New app" \
//!     --message "We need a mobile app for logistics tracking."
//!
//! # Inspect the staging store
//! intake staged list
//!
//! # Check microphone access
//! intake mic
//! ```

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{FormSession, IntakePipeline, SessionStatus, StagingStore, SubmitOutcome};
pub use domain::{EnquiryType, Field, FormState, StagedSubmission, SubmissionResult};

// Audio capture
pub use capture::{PermissionState, RecordingController, RecordingState};

// External collaborators
pub use adapters::{ConversionReporter, HttpSubmissionClient, PlatformSelector};
