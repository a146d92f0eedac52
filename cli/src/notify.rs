use reqwest::Client;
use sonda_common::models::ReconReport;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delivers finished reports to a webhook, off the request path.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl WebhookNotifier {
    /// A blank `url` disables notifications.
    pub fn new(url: Option<String>) -> Self {
        let url = url.map(|url| url.trim().to_string()).filter(|url| !url.is_empty());
        Self {
            client: Client::new(),
            url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// POSTs `report` as JSON on a detached task.
    ///
    /// Returns the task handle, or `None` when no webhook is configured.
    /// Delivery failures are logged and otherwise ignored.
    pub fn notify(&self, report: ReconReport) -> Option<JoinHandle<()>> {
        let Some(url) = self.url.clone() else {
            debug!("No webhook configured, not sending the report for {}", report.target);
            return None;
        };
        let client = self.client.clone();

        Some(tokio::spawn(async move {
            match client.post(&url).json(&report).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Report for {} delivered to {url}", report.target);
                }
                Ok(resp) => warn!("Webhook returned non-success status: {}", resp.status()),
                Err(e) => warn!("Failed to deliver report for {} to {url}: {e}", report.target),
            }
        }))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
