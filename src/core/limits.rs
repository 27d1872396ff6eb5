//! Intake limits and enforcement.
//!
//! Bounds user-supplied content through configurable limits on:
//! - Attachment count and per-item size
//! - Minimum message length
//! - Staged-submission retention

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits applied to an in-progress form and the staging store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeLimits {
    /// Maximum number of attachments (default: 5)
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Maximum size per attachment in bytes (default: 10 MiB)
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Minimum message length after trimming (default: 10)
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,

    /// Maximum staged submissions retained (default: 100)
    #[serde(default = "default_max_staged")]
    pub max_staged: usize,
}

fn default_max_attachments() -> usize {
    5
}
fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
} // 10 MiB
fn default_min_message_chars() -> usize {
    10
}
fn default_max_staged() -> usize {
    100
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_attachments: default_max_attachments(),
            max_attachment_bytes: default_max_attachment_bytes(),
            min_message_chars: default_min_message_chars(),
            max_staged: default_max_staged(),
        }
    }
}

impl IntakeLimits {
    /// Check a single attachment candidate's size.
    pub fn check_attachment_size(&self, name: &str, size_bytes: u64) -> Result<(), LimitViolation> {
        if size_bytes > self.max_attachment_bytes {
            return Err(LimitViolation::AttachmentTooLarge {
                name: name.to_string(),
                actual: size_bytes,
                limit: self.max_attachment_bytes,
            });
        }
        Ok(())
    }

    /// Check the attachment count.
    pub fn check_attachment_count(&self, count: usize) -> Result<(), LimitViolation> {
        if count > self.max_attachments {
            return Err(LimitViolation::TooManyAttachments {
                actual: count,
                limit: self.max_attachments,
            });
        }
        Ok(())
    }

    /// Check the trimmed message length.
    pub fn check_message(&self, message: &str) -> Result<(), LimitViolation> {
        let len = message.trim().chars().count();
        if len < self.min_message_chars {
            return Err(LimitViolation::MessageTooShort {
                actual: len,
                limit: self.min_message_chars,
            });
        }
        Ok(())
    }
}

/// Limit violation errors
#[derive(Debug, Clone, Error)]
pub enum LimitViolation {
    #[error("Attachment '{name}' exceeds size limit: {actual} > {limit} bytes")]
    AttachmentTooLarge {
        name: String,
        actual: u64,
        limit: u64,
    },

    #[error("Too many attachments: {actual} > {limit}")]
    TooManyAttachments { actual: usize, limit: usize },

    #[error("Message too short: {actual} < {limit} characters")]
    MessageTooShort { actual: usize, limit: usize },
}
