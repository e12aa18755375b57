//! Best-effort, rate-limited remote error reporting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::DiagnosticsConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ErrorReport<'a> {
    error: &'a str,
    stack: &'a str,
    context: &'a Value,
    site: &'a str,
    ua: String,
    url: &'a str,
}

/// Posts failure reports to the configured endpoint.
///
/// At most `limit` reports are attempted per reporter. Delivery problems are
/// logged at debug level and otherwise ignored.
#[derive(Debug)]
pub struct ErrorReporter {
    client: Option<reqwest::Client>,
    endpoint: Option<String>,
    site_key: String,
    limit: usize,
    attempted: AtomicUsize,
}

impl ErrorReporter {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        let endpoint = config.endpoint.clone().filter(|e| !e.trim().is_empty());
        let client = match &endpoint {
            Some(_) => match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::debug!(error = %e, "http client unavailable, error reporting disabled");
                    None
                }
            },
            None => None,
        };

        Self {
            client,
            endpoint,
            site_key: config.site_key.clone(),
            limit: config.limit,
            attempted: AtomicUsize::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(&DiagnosticsConfig::default())
    }

    /// Both an endpoint and a working HTTP client are needed.
    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some() && self.client.is_some()
    }

    /// Number of reports attempted so far.
    pub fn reports_sent(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Claims one slot of the budget. `false` once the limit is reached.
    fn try_acquire(&self) -> bool {
        self.attempted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Sends one report. Returns whether a request was attempted.
    pub async fn report(&self, message: &str, context: Value) -> bool {
        let (Some(endpoint), Some(client)) = (self.endpoint.as_deref(), self.client.as_ref()) else {
            return false;
        };
        if !self.try_acquire() {
            tracing::debug!("error report limit reached, dropping report");
            return false;
        }

        let payload = ErrorReport {
            error: message,
            stack: "",
            context: &context,
            site: &self.site_key,
            ua: format!("svgpng/{}", env!("CARGO_PKG_VERSION")),
            url: "convert",
        };

        match client.post(endpoint).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = %response.status(), "error report rejected");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "error report not delivered"),
        }
        true
    }

    /// Fires a report on the runtime without waiting for it.
    pub fn spawn_report(self: &Arc<Self>, message: String, context: Value) {
        if !self.is_enabled() {
            return;
        }
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            reporter.report(&message, context).await;
        });
    }
}
