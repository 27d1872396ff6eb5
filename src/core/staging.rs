//! Durable staging store with file-based persistence.
//!
//! Submission metadata is appended synchronously to a JSONL log before any
//! network delivery is attempted. Binary payloads are encoded to base64 by
//! best-effort background tasks, each writing its own per-slot side file so
//! partial completion never corrupts sibling slots or the metadata record.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{attachment_slot, FormState, StagedSubmission, RECORDING_SLOT};

/// Errors from the staging store
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File-based staging store using JSONL records plus per-slot payload files.
pub struct StagingStore {
    /// Path to the submissions.jsonl log
    records_path: PathBuf,

    /// Directory of per-submission payload side files
    payloads_dir: PathBuf,

    /// Retention: most recent records kept by prune
    max_staged: usize,
}

impl StagingStore {
    /// Open (creating if needed) a store rooted at the given directory.
    pub async fn open(staging_dir: &Path, max_staged: usize) -> Result<Self, StagingError> {
        let payloads_dir = staging_dir.join("payloads");
        fs::create_dir_all(&payloads_dir).await?;

        Ok(Self {
            records_path: staging_dir.join("submissions.jsonl"),
            payloads_dir,
            max_staged,
        })
    }

    /// Open the store in the configured default location.
    pub async fn open_default() -> anyhow::Result<Self> {
        let dir = crate::config::staging_dir()?;
        let max_staged = crate::config::config()?.limits.max_staged;
        Ok(Self::open(&dir, max_staged).await?)
    }

    /// Path to the JSONL record log
    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    /// Directory holding a submission's payload slot files
    pub fn payload_dir(&self, id: &str) -> PathBuf {
        self.payloads_dir.join(id)
    }

    /// Synchronously stage the form's metadata record.
    ///
    /// The record is appended and flushed before this returns; callers may
    /// rely on it being durable before any network call. Retention is
    /// applied afterwards, best-effort.
    pub async fn stage(&self, form: &FormState) -> Result<StagedSubmission, StagingError> {
        let record = StagedSubmission::from_form(form);
        self.append(&record).await?;

        if let Err(err) = self.prune().await {
            warn!(error = %err, "staging retention pass failed");
        }

        Ok(record)
    }

    /// Append one record to the log.
    async fn append(&self, record: &StagedSubmission) -> Result<(), StagingError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)
            .await?;

        let json = serde_json::to_string(record)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Spawn one best-effort encoding task per binary slot.
    ///
    /// Each task writes its own slot file; failures are logged and never
    /// affect the metadata record or sibling slots. The handles are
    /// returned so callers may await completion (tests) or drop them
    /// (fire-and-forget).
    pub fn spawn_encodings(&self, id: &str, form: &FormState) -> Vec<JoinHandle<()>> {
        let dir = self.payload_dir(id);
        let mut tasks = Vec::new();

        for (index, attachment) in form.attachments.iter().enumerate() {
            let src = attachment.path.clone();
            let dest = dir.join(format!("{}.b64", attachment_slot(index)));
            tasks.push(tokio::spawn(async move {
                if let Err(err) = encode_file_slot(&src, &dest).await {
                    warn!(
                        source = %src.display(),
                        slot = %dest.display(),
                        error = %err,
                        "attachment encoding failed"
                    );
                }
            }));
        }

        if let Some(recording) = &form.recording {
            let audio = recording.audio.clone();
            let dest = dir.join(format!("{}.b64", RECORDING_SLOT));
            tasks.push(tokio::spawn(async move {
                if let Err(err) = write_slot(&dest, &STANDARD.encode(&audio.wav)).await {
                    warn!(slot = %dest.display(), error = %err, "recording encoding failed");
                }
            }));
        }

        debug!(id, slots = tasks.len(), "binary payload encoding started");
        tasks
    }

    /// Replay all staged records in append order.
    pub async fn list(&self) -> Result<Vec<StagedSubmission>, StagingError> {
        if !self.records_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.records_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: StagedSubmission = serde_json::from_str(&line)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Fetch one staged record by id.
    pub async fn get(&self, id: &str) -> Result<Option<StagedSubmission>, StagingError> {
        let records = self.list().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Load one encoded payload slot, if its task has completed.
    pub async fn load_payload(&self, id: &str, slot: &str) -> Result<Option<String>, StagingError> {
        let path = self.payload_dir(id).join(format!("{}.b64", slot));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path).await?))
    }

    /// Slot names with a completed payload file for the given id.
    pub async fn payload_slots(&self, id: &str) -> Result<Vec<String>, StagingError> {
        let dir = self.payload_dir(id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(slot) = name.strip_suffix(".b64") {
                    slots.push(slot.to_string());
                }
            }
        }
        slots.sort();
        Ok(slots)
    }

    /// Apply retention: keep the most recent `max_staged` records and drop
    /// payload directories that no longer have a record.
    ///
    /// Returns the number of records removed.
    pub async fn prune(&self) -> Result<usize, StagingError> {
        let records = self.list().await?;
        if records.len() <= self.max_staged {
            return Ok(0);
        }

        let removed = records.len() - self.max_staged;
        let kept: Vec<StagedSubmission> =
            records.into_iter().skip(removed).collect();
        let kept_ids: HashSet<&str> = kept.iter().map(|r| r.id.as_str()).collect();

        // rewrite through a temp file, then swap into place
        let tmp_path = self.records_path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path).await?;
            for record in &kept {
                let json = serde_json::to_string(record)?;
                tmp.write_all(format!("{}\n", json).as_bytes()).await?;
            }
            tmp.flush().await?;
        }
        fs::rename(&tmp_path, &self.records_path).await?;

        // drop payload directories of evicted submissions
        if self.payloads_dir.exists() {
            let mut entries = fs::read_dir(&self.payloads_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Some(name) = entry.file_name().to_str() {
                    if !kept_ids.contains(name) {
                        if let Err(err) = fs::remove_dir_all(entry.path()).await {
                            warn!(id = name, error = %err, "failed to drop evicted payloads");
                        }
                    }
                }
            }
        }

        debug!(removed, kept = kept.len(), "staging retention applied");
        Ok(removed)
    }
}

/// Read a file and write its base64 form into a slot file.
async fn encode_file_slot(src: &Path, dest: &Path) -> Result<(), StagingError> {
    let bytes = fs::read(src).await?;
    write_slot(dest, &STANDARD.encode(&bytes)).await
}

/// Write encoded text into a slot file, creating the directory as needed.
async fn write_slot(dest: &Path, text: &str) -> Result<(), StagingError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(dest, text).await?;
    Ok(())
}
