//! Conversion reporter.
//!
//! Fans one normalized conversion event out to the requested ad-platform
//! sinks. Dispatches are independent: one platform failing never blocks
//! the other, and no failure here ever reaches the user path.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::EnquiryType;

use super::{ConversionEvent, ConversionSink};

/// Which platforms a report targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlatformSelector {
    Google,
    Meta,
    Both,
}

impl PlatformSelector {
    /// Whether the selector covers the given platform key.
    pub fn includes(&self, platform: &str) -> bool {
        match self {
            Self::Both => true,
            Self::Google => platform == "google",
            Self::Meta => platform == "meta",
        }
    }
}

/// Identity fields extracted from the form's contact details.
#[derive(Debug, Clone)]
pub struct ConversionIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl ConversionIdentity {
    /// Split the free-text name on whitespace: first token becomes the
    /// first name, the remainder rejoined becomes the last name.
    pub fn from_contact(name: &str, email: &str, phone: Option<&str>) -> Self {
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");

        Self {
            email: email.to_string(),
            first_name,
            last_name,
            phone: phone.map(|p| p.to_string()),
        }
    }
}

/// Outcome of one platform dispatch.
#[derive(Debug, Clone)]
pub struct PlatformOutcome {
    pub platform: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Aggregate result of a conversion report.
///
/// `complete` means every requested dispatch ran to completion; individual
/// failures live in `platforms`. Used purely for observability.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub complete: bool,
    pub platforms: Vec<PlatformOutcome>,
}

impl ConversionResult {
    /// Whether every requested platform accepted the event
    pub fn all_ok(&self) -> bool {
        self.complete && self.platforms.iter().all(|p| p.ok)
    }
}

/// Fans conversion events out to the configured sinks.
pub struct ConversionReporter {
    sinks: Vec<Arc<dyn ConversionSink>>,
}

impl Default for ConversionReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionReporter {
    /// Create a reporter with no sinks (reports become no-ops).
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn ConversionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Dispatch one conversion event to every selected sink.
    ///
    /// Sinks run concurrently and independently; a failure is captured in
    /// its platform's outcome and never aborts the others.
    pub async fn report(
        &self,
        identity: ConversionIdentity,
        enquiry_type: Option<EnquiryType>,
        selector: PlatformSelector,
    ) -> ConversionResult {
        let event = ConversionEvent {
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            phone: identity.phone,
            enquiry_type,
            occurred_at: Utc::now(),
        };

        let mut handles = Vec::new();
        for sink in &self.sinks {
            if !selector.includes(sink.platform()) {
                continue;
            }
            let sink = sink.clone();
            let event = event.clone();
            handles.push(tokio::spawn(async move {
                let platform = sink.platform().to_string();
                match sink.send(&event).await {
                    Ok(()) => {
                        debug!(platform = %platform, "conversion reported");
                        PlatformOutcome {
                            platform,
                            ok: true,
                            error: None,
                        }
                    }
                    Err(err) => {
                        warn!(platform = %platform, error = %err, "conversion report failed");
                        PlatformOutcome {
                            platform,
                            ok: false,
                            error: Some(err.to_string()),
                        }
                    }
                }
            }));
        }

        let mut complete = true;
        let mut platforms = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(outcome) => platforms.push(outcome),
                Err(err) => {
                    warn!(error = %err, "conversion dispatch task failed");
                    complete = false;
                }
            }
        }

        ConversionResult {
            complete,
            platforms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSink {
        platform: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConversionSink for StubSink {
        fn platform(&self) -> &str {
            self.platform
        }

        async fn send(&self, _event: &ConversionEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("{} is down", self.platform)
            }
            Ok(())
        }
    }

    fn reporter_with(
        google_fails: bool,
        meta_fails: bool,
    ) -> (ConversionReporter, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let google_calls = Arc::new(AtomicUsize::new(0));
        let meta_calls = Arc::new(AtomicUsize::new(0));
        let reporter = ConversionReporter::new()
            .with_sink(Arc::new(StubSink {
                platform: "google",
                fail: google_fails,
                calls: google_calls.clone(),
            }))
            .with_sink(Arc::new(StubSink {
                platform: "meta",
                fail: meta_fails,
                calls: meta_calls.clone(),
            }));
        (reporter, google_calls, meta_calls)
    }

    fn identity() -> ConversionIdentity {
        ConversionIdentity::from_contact("Jane Doe", "jane@example.com", None)
    }

    #[test]
    fn test_name_splitting() {
        let id = ConversionIdentity::from_contact("Jane Alexandra van Doe", "j@d.com", None);
        assert_eq!(id.first_name, "Jane");
        assert_eq!(id.last_name, "Alexandra van Doe");

        let single = ConversionIdentity::from_contact("Cher", "c@c.com", None);
        assert_eq!(single.first_name, "Cher");
        assert_eq!(single.last_name, "");

        let empty = ConversionIdentity::from_contact("   ", "x@y.com", None);
        assert_eq!(empty.first_name, "");
        assert_eq!(empty.last_name, "");
    }

    #[tokio::test]
    async fn test_both_platforms_dispatched() {
        let (reporter, google_calls, meta_calls) = reporter_with(false, false);

        let result = reporter
            .report(identity(), None, PlatformSelector::Both)
            .await;

        assert!(result.all_ok());
        assert_eq!(result.platforms.len(), 2);
        assert_eq!(google_calls.load(Ordering::SeqCst), 1);
        assert_eq!(meta_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_other() {
        let (reporter, google_calls, meta_calls) = reporter_with(true, false);

        let result = reporter
            .report(identity(), None, PlatformSelector::Both)
            .await;

        assert!(result.complete);
        assert!(!result.all_ok());
        assert_eq!(google_calls.load(Ordering::SeqCst), 1);
        assert_eq!(meta_calls.load(Ordering::SeqCst), 1);

        let google = result
            .platforms
            .iter()
            .find(|p| p.platform == "google")
            .unwrap();
        assert!(!google.ok);
        assert!(google.error.as_deref().unwrap().contains("google is down"));

        let meta = result.platforms.iter().find(|p| p.platform == "meta").unwrap();
        assert!(meta.ok);
    }

    #[tokio::test]
    async fn test_selector_limits_dispatch() {
        let (reporter, google_calls, meta_calls) = reporter_with(false, false);

        let result = reporter
            .report(identity(), None, PlatformSelector::Meta)
            .await;

        assert_eq!(result.platforms.len(), 1);
        assert_eq!(google_calls.load(Ordering::SeqCst), 0);
        assert_eq!(meta_calls.load(Ordering::SeqCst), 1);
    }
}
