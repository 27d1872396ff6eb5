//! HTTP submission client.
//!
//! Delivers the validated payload to the external enquiry endpoint and
//! interprets its structured response envelope. Transport-level failures
//! (no response, malformed body) are normalized into a generic Failure
//! with a fixed fallback message. No automatic retry; retry is the
//! caller's decision.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::{FieldError, SubmissionResult};

use super::{SubmissionApi, SubmissionPayload};

/// Fixed message shown when the endpoint cannot be reached or returns
/// something unreadable.
pub const FALLBACK_FAILURE_MESSAGE: &str =
    "We could not send your enquiry. Please try again in a moment.";

/// Default acknowledgment when a success envelope carries no message.
const DEFAULT_SUCCESS_MESSAGE: &str = "Thanks! Your enquiry has been received.";

/// Response envelope from the enquiry endpoint
#[derive(Debug, Default, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    message: Option<String>,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    errors: Option<Vec<FieldError>>,

    #[serde(default)]
    code: Option<String>,
}

/// Token envelope from the CSRF side channel
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Submission client over HTTP
pub struct HttpSubmissionClient {
    /// Enquiry endpoint URL
    submit_url: String,

    /// CSRF token side channel, if the deployment uses one
    token_url: Option<String>,

    /// HTTP client
    client: reqwest::Client,

    /// Token fetched once at activation
    csrf_token: OnceCell<Option<String>>,
}

impl HttpSubmissionClient {
    /// Create a new client
    pub fn new(submit_url: String, token_url: Option<String>) -> Self {
        Self {
            submit_url,
            token_url,
            client: reqwest::Client::new(),
            csrf_token: OnceCell::new(),
        }
    }

    /// Fetch the CSRF token from the side channel, absorbing failures.
    async fn fetch_token(&self) -> Option<String> {
        let url = self.token_url.as_ref()?;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "CSRF token fetch failed");
                return None;
            }
        };

        match response.json::<TokenResponse>().await {
            Ok(body) => {
                debug!("CSRF token acquired");
                Some(body.token)
            }
            Err(err) => {
                warn!(error = %err, "CSRF token response unreadable");
                None
            }
        }
    }

    /// The generic failure every transport problem normalizes to.
    fn transport_failure() -> SubmissionResult {
        SubmissionResult::Failure {
            message: FALLBACK_FAILURE_MESSAGE.to_string(),
            field_errors: Vec::new(),
            code: None,
        }
    }

    /// Interpret a decoded envelope together with the transport status.
    fn interpret(status_ok: bool, envelope: ResponseEnvelope) -> SubmissionResult {
        if status_ok && envelope.success {
            SubmissionResult::Success {
                id: envelope.id.unwrap_or_default(),
                message: envelope
                    .message
                    .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
            }
        } else {
            SubmissionResult::Failure {
                message: envelope
                    .message
                    .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string()),
                field_errors: envelope.errors.unwrap_or_default(),
                code: envelope.code,
            }
        }
    }
}

#[async_trait]
impl SubmissionApi for HttpSubmissionClient {
    fn name(&self) -> &str {
        "http"
    }

    /// One-time activation: fetch the CSRF token from the side channel.
    async fn activate(&self) -> Result<()> {
        self.csrf_token
            .get_or_init(|| self.fetch_token())
            .await;
        Ok(())
    }

    async fn submit(&self, payload: &SubmissionPayload) -> SubmissionResult {
        let mut request = self.client.post(&self.submit_url).json(payload);
        if let Some(Some(token)) = self.csrf_token.get() {
            request = request.header("X-CSRF-Token", token.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "submission transport failed");
                return Self::transport_failure();
            }
        };

        let status_ok = response.status().is_success();
        let envelope = match response.json::<ResponseEnvelope>().await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "submission response unreadable");
                return Self::transport_failure();
            }
        };

        Self::interpret(status_ok, envelope)
    }
}
