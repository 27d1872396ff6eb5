//! Form state and the references it holds to binary content.
//!
//! FormState is mutated only through FormSession setters; the validator
//! and submission client only ever borrow it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete state of one in-progress enquiry form.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    /// Free-text contact name
    pub name: String,

    /// Contact email address
    pub email: String,

    /// Selected enquiry category (if any)
    pub enquiry_type: Option<EnquiryType>,

    /// Subject line
    pub subject: String,

    /// Message body
    pub message: String,

    /// Ordered attachment list (0..=5 entries)
    pub attachments: Vec<AttachmentRef>,

    /// Captured voice note, if one exists
    pub recording: Option<RecordingRef>,
}

/// A reference to an attached file.
///
/// The `path` is the opaque content handle; bytes are not read until the
/// staging encode step.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    /// File name (no directory component)
    pub name: String,

    /// Size on disk in bytes
    pub size_bytes: u64,

    /// Guessed MIME type
    pub mime_type: String,

    /// Filesystem modification time
    pub last_modified: DateTime<Utc>,

    /// Opaque handle to the file content
    pub path: PathBuf,
}

impl AttachmentRef {
    /// Build a reference from a file on disk, reading only its metadata.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            mime_type: mime_for_path(path).to_string(),
            size_bytes: meta.len(),
            last_modified,
            name,
            path: path.to_path_buf(),
        })
    }
}

/// Guess a MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Finalized audio captured from the microphone.
///
/// `wav` is a complete 16-bit PCM WAV file (canonical 44-byte header) as
/// produced by the capture backend.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    /// Complete WAV file bytes
    pub wav: Vec<u8>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,
}

impl CapturedAudio {
    /// Total size of the WAV payload in bytes
    pub fn size_bytes(&self) -> u64 {
        self.wav.len() as u64
    }

    /// Duration in whole seconds, derived from the PCM data length.
    pub fn duration_secs(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let data_bytes = self.wav.len().saturating_sub(44) as u64;
        let frames = data_bytes / 2 / self.channels as u64;
        frames / self.sample_rate as u64
    }
}

/// A reference to the captured voice note.
///
/// At most one exists per FormState, and only while the recording state
/// machine is in Captured, Playing, or Paused.
#[derive(Debug, Clone)]
pub struct RecordingRef {
    /// Opaque handle to the audio content
    pub audio: Arc<CapturedAudio>,

    /// MIME type of the encoded audio
    pub mime_type: String,

    /// Recorded duration in whole seconds
    pub duration_secs: u64,
}

impl RecordingRef {
    /// Wrap finalized capture output.
    pub fn from_audio(audio: CapturedAudio) -> Self {
        let duration_secs = audio.duration_secs();
        Self {
            audio: Arc::new(audio),
            mime_type: "audio/wav".to_string(),
            duration_secs,
        }
    }

    /// Size of the audio payload in bytes
    pub fn size_bytes(&self) -> u64 {
        self.audio.size_bytes()
    }
}

/// Recognized enquiry categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryType {
    General,
    Project,
    Support,
    Partnership,
    Careers,
    Consultation,
}

impl EnquiryType {
    /// Wire/key form of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Project => "project",
            Self::Support => "support",
            Self::Partnership => "partnership",
            Self::Careers => "careers",
            Self::Consultation => "consultation",
        }
    }
}

impl std::fmt::Display for EnquiryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form fields that validation errors attach to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    EnquiryType,
    Subject,
    Message,
    Attachments,
    Recording,
}

impl Field {
    /// Key form used in error paths and display
    pub fn key(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::EnquiryType => "enquiry_type",
            Self::Subject => "subject",
            Self::Message => "message",
            Self::Attachments => "attachments",
            Self::Recording => "recording",
        }
    }

    /// Resolve a server-reported error path to a field, if it matches.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "enquiry_type" | "enquiryType" => Some(Self::EnquiryType),
            "subject" => Some(Self::Subject),
            "message" => Some(Self::Message),
            "attachments" => Some(Self::Attachments),
            "recording" => Some(Self::Recording),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_guessing() {
        assert_eq!(mime_for_path(Path::new("brief.pdf")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(
            mime_for_path(Path::new("unknown.bin")),
            "application/octet-stream"
        );
        assert_eq!(
            mime_for_path(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_captured_audio_duration() {
        // 16 kHz mono, 16-bit: 32000 data bytes per second
        let audio = CapturedAudio {
            wav: vec![0u8; 44 + 32000 * 3],
            sample_rate: 16_000,
            channels: 1,
        };
        assert_eq!(audio.duration_secs(), 3);
    }

    #[test]
    fn test_recording_ref_from_audio() {
        let audio = CapturedAudio {
            wav: vec![0u8; 44 + 32000],
            sample_rate: 16_000,
            channels: 1,
        };
        let rec = RecordingRef::from_audio(audio);
        assert_eq!(rec.mime_type, "audio/wav");
        assert_eq!(rec.duration_secs, 1);
    }

    #[test]
    fn test_field_key_round_trip() {
        for field in [
            Field::Name,
            Field::Email,
            Field::EnquiryType,
            Field::Subject,
            Field::Message,
            Field::Attachments,
            Field::Recording,
        ] {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("unknown"), None);
    }

    #[test]
    fn test_enquiry_type_serde() {
        let json = serde_json::to_string(&EnquiryType::Project).unwrap();
        assert_eq!(json, "\"project\"");
        let parsed: EnquiryType = serde_json::from_str("\"consultation\"").unwrap();
        assert_eq!(parsed, EnquiryType::Consultation);
    }
}
