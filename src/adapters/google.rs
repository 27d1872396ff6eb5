//! Google Ads conversion sink.
//!
//! Uploads an enhanced click conversion for one lead. Identity fields are
//! SHA-256 hashed before transmission, as the API requires.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{hashed_identifier, ConversionEvent, ConversionSink};

/// Configuration for the Google Ads sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAdsConfig {
    /// Conversion upload endpoint
    pub endpoint: String,

    /// Conversion action resource the lead counts against
    pub conversion_action: String,

    /// Developer token
    pub api_token: String,
}

/// Google Ads conversion client
pub struct GoogleAdsSink {
    config: GoogleAdsConfig,
    client: reqwest::Client,
}

/// One uploaded conversion
#[derive(Debug, Serialize)]
struct ConversionUpload {
    conversion_action: String,
    conversion_date_time: String,
    user_identifiers: Vec<UserIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversion_environment: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum UserIdentifier {
    HashedEmail(String),
    HashedPhoneNumber(String),
}

/// Upload response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    partial_failure_error: Option<PartialFailure>,
}

#[derive(Debug, Deserialize)]
struct PartialFailure {
    #[serde(default)]
    message: Option<String>,
}

impl GoogleAdsSink {
    /// Create a sink from configuration
    pub fn new(config: GoogleAdsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ConversionSink for GoogleAdsSink {
    fn platform(&self) -> &str {
        "google"
    }

    async fn send(&self, event: &ConversionEvent) -> Result<()> {
        let mut user_identifiers = vec![UserIdentifier::HashedEmail(hashed_identifier(
            &event.email,
        ))];
        if let Some(phone) = &event.phone {
            user_identifiers.push(UserIdentifier::HashedPhoneNumber(hashed_identifier(phone)));
        }

        let upload = ConversionUpload {
            conversion_action: self.config.conversion_action.clone(),
            conversion_date_time: event.occurred_at.to_rfc3339(),
            user_identifiers,
            conversion_environment: event.enquiry_type.map(|t| t.to_string()),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("developer-token", self.config.api_token.as_str())
            .json(&upload)
            .send()
            .await
            .context("Failed to reach Google Ads")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Google Ads error ({}): {}", status, text);
        }

        let body: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Google Ads response")?;
        if let Some(failure) = body.partial_failure_error {
            anyhow::bail!(
                "Google Ads rejected the conversion: {}",
                failure.message.unwrap_or_default()
            );
        }

        Ok(())
    }
}
