//! Meta Conversions API sink.
//!
//! Sends one server-side Lead event per submission. User data fields are
//! SHA-256 hashed before transmission, as the API requires.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{hashed_identifier, ConversionEvent, ConversionSink};

/// Configuration for the Meta sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCapiConfig {
    /// Graph API base endpoint
    pub endpoint: String,

    /// Pixel (dataset) id
    pub pixel_id: String,

    /// System-user access token
    pub access_token: String,
}

/// Meta Conversions API client
pub struct MetaCapiSink {
    config: MetaCapiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EventBatch {
    data: Vec<ServerEvent>,
}

#[derive(Debug, Serialize)]
struct ServerEvent {
    event_name: String,
    event_time: i64,
    action_source: String,
    user_data: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_data: Option<CustomData>,
}

#[derive(Debug, Serialize)]
struct UserData {
    em: Vec<String>,
    #[serde(rename = "fn", skip_serializing_if = "Vec::is_empty")]
    fn_: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ln: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ph: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CustomData {
    enquiry_type: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    events_received: u32,
}

impl MetaCapiSink {
    /// Create a sink from configuration
    pub fn new(config: MetaCapiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/{}/events",
            self.config.endpoint.trim_end_matches('/'),
            self.config.pixel_id
        )
    }
}

#[async_trait]
impl ConversionSink for MetaCapiSink {
    fn platform(&self) -> &str {
        "meta"
    }

    async fn send(&self, event: &ConversionEvent) -> Result<()> {
        let user_data = UserData {
            em: vec![hashed_identifier(&event.email)],
            fn_: if event.first_name.is_empty() {
                Vec::new()
            } else {
                vec![hashed_identifier(&event.first_name)]
            },
            ln: if event.last_name.is_empty() {
                Vec::new()
            } else {
                vec![hashed_identifier(&event.last_name)]
            },
            ph: event
                .phone
                .iter()
                .map(|p| hashed_identifier(p))
                .collect(),
        };

        let batch = EventBatch {
            data: vec![ServerEvent {
                event_name: "Lead".to_string(),
                event_time: event.occurred_at.timestamp(),
                action_source: "website".to_string(),
                user_data,
                custom_data: event.enquiry_type.map(|t| CustomData {
                    enquiry_type: t.to_string(),
                }),
            }],
        };

        let response = self
            .client
            .post(self.events_url())
            .query(&[("access_token", self.config.access_token.as_str())])
            .json(&batch)
            .send()
            .await
            .context("Failed to reach Meta")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Meta error ({}): {}", status, text);
        }

        let body: BatchResponse = response
            .json()
            .await
            .context("Failed to parse Meta response")?;
        if body.events_received == 0 {
            anyhow::bail!("Meta accepted the batch but received no events");
        }

        Ok(())
    }
}
