//! Command-line interface for intake.
//!
//! Provides commands for submitting an enquiry, inspecting the staging
//! store, and checking microphone access.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    ConversionReporter, GoogleAdsSink, HttpSubmissionClient, MetaCapiSink, PlatformSelector,
};
use crate::capture::{
    CpalCaptureBackend, PermissionState, RecordingController, RodioPlaybackBackend,
};
use crate::config;
use crate::core::{
    FormSession, IntakeLimits, IntakePipeline, SessionStatus, SharedSession, StagingStore,
    SubmitOutcome, ValidationErrors,
};
use crate::domain::{EnquiryType, FieldGlyph};

/// intake - Multi-modal inquiry intake pipeline
#[derive(Parser, Debug)]
#[command(name = "intake")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit an enquiry
    Submit {
        /// Contact name
        #[arg(long)]
        name: String,

        /// Contact email
        #[arg(long)]
        email: String,

        /// Enquiry type
        #[arg(long = "type", value_enum)]
        enquiry_type: Option<EnquiryType>,

        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(long)]
        message: String,

        /// Attach a file (repeatable, up to 5)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,

        /// Record a voice note before submitting
        #[arg(long)]
        record: bool,

        /// Conversion platforms to report to
        #[arg(long, value_enum, default_value = "both")]
        platforms: PlatformSelector,
    },

    /// Inspect the staging store
    Staged {
        #[command(subcommand)]
        command: StagedCommands,
    },

    /// Check microphone permission and devices
    Mic,

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum StagedCommands {
    /// List staged submissions
    List {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one staged submission
    Show {
        /// Submission id
        id: String,
    },

    /// Apply retention now
    Prune,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Submit {
                name,
                email,
                enquiry_type,
                subject,
                message,
                attachments,
                record,
                platforms,
            } => {
                submit(
                    name,
                    email,
                    enquiry_type,
                    subject,
                    message,
                    attachments,
                    record,
                    platforms,
                )
                .await
            }
            Commands::Staged { command } => match command {
                StagedCommands::List { limit } => staged_list(limit).await,
                StagedCommands::Show { id } => staged_show(&id).await,
                StagedCommands::Prune => staged_prune().await,
            },
            Commands::Mic => mic_check().await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the production pipeline from configuration.
async fn build_pipeline(platforms: PlatformSelector) -> Result<IntakePipeline> {
    let cfg = config::config()?;

    let staging = Arc::new(StagingStore::open_default().await?);

    let submit_url = cfg.endpoint.submit_url.clone().context(
        "No submission endpoint configured; set endpoint.submit_url in \
         .intake/config.yaml or INTAKE_ENDPOINT",
    )?;
    let api = Arc::new(HttpSubmissionClient::new(
        submit_url,
        cfg.endpoint.token_url.clone(),
    ));

    let mut reporter = ConversionReporter::new();
    if let Some(google) = cfg.conversion.google.clone() {
        reporter = reporter.with_sink(Arc::new(GoogleAdsSink::new(google)));
    }
    if let Some(meta) = cfg.conversion.meta.clone() {
        reporter = reporter.with_sink(Arc::new(MetaCapiSink::new(meta)));
    }

    Ok(
        IntakePipeline::new(staging, api, Arc::new(reporter))
            .with_platforms(platforms)
            .with_reset_delay(Duration::from_secs(cfg.reset_delay_secs)),
    )
}

/// Build a session driven by the real audio backends.
fn build_session() -> Result<SharedSession> {
    let limits = config::config()?.limits.clone();
    let recorder = RecordingController::new(
        Arc::new(CpalCaptureBackend::new()),
        Arc::new(RodioPlaybackBackend::new()),
    );
    Ok(FormSession::new(recorder, limits).into_shared())
}

#[allow(clippy::too_many_arguments)]
async fn submit(
    name: String,
    email: String,
    enquiry_type: Option<EnquiryType>,
    subject: String,
    message: String,
    attachments: Vec<PathBuf>,
    record: bool,
    platforms: PlatformSelector,
) -> Result<()> {
    let pipeline = build_pipeline(platforms).await?;
    pipeline.activate().await?;

    let session = build_session()?;

    {
        let mut guard = session.lock().await;
        guard.set_name(name);
        guard.set_email(email);
        guard.set_enquiry_type(enquiry_type);
        guard.set_subject(subject);
        guard.set_message(message);
        guard.add_files(&attachments);
    }

    if record {
        record_voice_note(&session).await?;
    }

    let outcome = pipeline.submit(&session).await?;
    match outcome {
        SubmitOutcome::Rejected(errors) => {
            println!("{} Please fix the following fields:", FieldGlyph::Cross.symbol());
            print_field_errors(&errors);
        }
        SubmitOutcome::Completed(_) => {
            let guard = session.lock().await;
            match guard.status() {
                SessionStatus::Confirmed { id, message } => {
                    println!("{} {} (ref: {})", FieldGlyph::Check.symbol(), message, id);
                }
                SessionStatus::Failed { message } => {
                    println!("{} {}", FieldGlyph::Cross.symbol(), message);
                    print_field_errors(guard.errors());
                }
                SessionStatus::Editing => {}
            }
        }
    }

    Ok(())
}

/// Record a voice note, stopping on Enter.
async fn record_voice_note(session: &SharedSession) -> Result<()> {
    {
        let mut guard = session.lock().await;
        if !guard.start_recording().await {
            let errors = guard.errors().clone();
            print_field_errors(&errors);
            return Ok(());
        }
    }

    println!(
        "{} Recording... press Enter to stop",
        FieldGlyph::Microphone.symbol()
    );
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    })
    .await?
    .context("Failed to read from stdin")?;

    let mut guard = session.lock().await;
    guard.stop_recording();
    if let Some(recording) = &guard.form().recording {
        println!(
            "{} Captured {}s of audio ({} KiB)",
            FieldGlyph::Check.symbol(),
            recording.duration_secs,
            recording.size_bytes() / 1024
        );
    }
    Ok(())
}

fn print_field_errors(errors: &ValidationErrors) {
    for (field, message) in errors {
        println!(
            "  {} {}: {}",
            FieldGlyph::for_field(*field).symbol(),
            field,
            message
        );
    }
}

async fn staged_list(limit: usize) -> Result<()> {
    let store = StagingStore::open_default().await?;
    let records = store.list().await?;

    if records.is_empty() {
        println!("No staged submissions");
        return Ok(());
    }

    for record in records.iter().rev().take(limit) {
        println!(
            "{}  {}  {}  <{}>",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.fields.name,
            record.fields.email
        );
    }
    Ok(())
}

async fn staged_show(id: &str) -> Result<()> {
    let store = StagingStore::open_default().await?;
    let record = store
        .get(id)
        .await?
        .with_context(|| format!("No staged submission with id {}", id))?;

    println!("id:       {}", record.id);
    println!("created:  {}", record.created_at.to_rfc3339());
    println!("name:     {}", record.fields.name);
    println!("email:    {}", record.fields.email);
    if let Some(enquiry_type) = record.fields.enquiry_type {
        println!("type:     {}", enquiry_type);
    }
    println!("subject:  {}", record.fields.subject);
    println!("message:  {}", record.fields.message);

    for (index, attachment) in record.attachments.iter().enumerate() {
        println!(
            "{} attachment {}: {} ({} bytes, {})",
            FieldGlyph::Paperclip.symbol(),
            index,
            attachment.name,
            attachment.size_bytes,
            attachment.mime_type
        );
    }
    if let Some(recording) = &record.recording {
        println!(
            "{} recording: {}s ({} bytes, {})",
            FieldGlyph::Microphone.symbol(),
            recording.duration_secs,
            recording.size_bytes,
            recording.mime_type
        );
    }

    let slots = store.payload_slots(id).await?;
    if slots.is_empty() {
        println!("payloads: (none encoded)");
    } else {
        println!("payloads: {}", slots.join(", "));
    }
    Ok(())
}

async fn staged_prune() -> Result<()> {
    let store = StagingStore::open_default().await?;
    let removed = store.prune().await?;
    println!("Removed {} staged submission(s)", removed);
    Ok(())
}

async fn mic_check() -> Result<()> {
    let limits = IntakeLimits::default();
    let recorder = RecordingController::new(
        Arc::new(CpalCaptureBackend::new()),
        Arc::new(RodioPlaybackBackend::new()),
    );
    let mut session = FormSession::new(recorder, limits);

    let state = session.request_permission().await;
    match state {
        PermissionState::Granted => {
            println!("{} Microphone access granted", FieldGlyph::Check.symbol())
        }
        PermissionState::Denied => {
            println!("{} Microphone access denied", FieldGlyph::Cross.symbol())
        }
        other => println!("Microphone permission: {:?}", other),
    }

    match CpalCaptureBackend::input_devices() {
        Ok(devices) if devices.is_empty() => println!("No input devices found"),
        Ok(devices) => {
            for device in devices {
                println!("  {} {}", FieldGlyph::Microphone.symbol(), device);
            }
        }
        Err(err) => println!("Could not enumerate input devices: {}", err),
    }
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("home:          {}", cfg.home.display());
    match &cfg.config_file {
        Some(path) => println!("config file:   {}", path.display()),
        None => println!("config file:   (none found)"),
    }
    println!(
        "submit url:    {}",
        cfg.endpoint.submit_url.as_deref().unwrap_or("(unset)")
    );
    println!(
        "token url:     {}",
        cfg.endpoint.token_url.as_deref().unwrap_or("(unset)")
    );
    println!(
        "conversion:    google={} meta={}",
        cfg.conversion.google.is_some(),
        cfg.conversion.meta.is_some()
    );
    println!(
        "limits:        {} attachments, {} bytes each, message >= {} chars",
        cfg.limits.max_attachments, cfg.limits.max_attachment_bytes, cfg.limits.min_message_chars
    );
    println!("retention:     keep {} staged", cfg.limits.max_staged);
    println!("reset delay:   {}s", cfg.reset_delay_secs);
    Ok(())
}
