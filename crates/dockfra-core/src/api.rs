//! HTTP client for the wizard's REST endpoints

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::action::FormSnapshot;
use crate::devices::DeviceIps;
use crate::diff::TicketDiff;
use crate::logstream::{LogLine, LogTail};
use crate::panels::{
    ContainerInfo, DeveloperHealth, EngineStatus, ProcessAction, ProcessActionResult,
    ProcessEntry, Stats,
};
use crate::state::ChatMessage;
use crate::ticket::Ticket;
use crate::widget::{DetectResult, SelectOption};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Subnet scans ping the whole network
const SCAN_TIMEOUT: Duration = Duration::from_secs(60);

/// `/api/history` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default)]
    pub conversation: Vec<ChatMessage>,
    #[serde(default)]
    pub logs: Vec<LogLine>,
    #[serde(default)]
    pub current_step: Option<String>,
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
    form: &'a FormSnapshot,
}

/// `POST /api/action` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct OptionsResponse {
    #[serde(default)]
    options: Vec<SelectOption>,
}

#[derive(Clone)]
pub struct WizardClient {
    client: Client,
    base_url: Url,
}

impl WizardClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid server URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("invalid server URL: {}", base_url));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL from path segments; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::trace!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url.path()))?;
        if !response.status().is_success() {
            return Err(anyhow!("GET {} failed with status: {}", url.path(), response.status()));
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding {}", url.path()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        tracing::trace!(%url, "POST");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {}", url.path()))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("POST {} failed with status {}: {}", url.path(), status, text));
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding {}", url.path()))
    }

    pub async fn logs_tail(&self, n: usize) -> Result<LogTail> {
        let mut url = self.url(&["api", "logs", "tail"]);
        url.query_pairs_mut().append_pair("n", &n.to_string());
        self.get_json(url).await
    }

    pub async fn history(&self) -> Result<History> {
        self.get_json(self.url(&["api", "history"])).await
    }

    pub async fn processes(&self) -> Result<Vec<ProcessEntry>> {
        self.get_json(self.url(&["api", "processes"])).await
    }

    pub async fn containers(&self) -> Result<Vec<ContainerInfo>> {
        self.get_json(self.url(&["api", "containers"])).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.get_json(self.url(&["api", "stats"])).await
    }

    pub async fn tickets(&self) -> Result<Vec<Ticket>> {
        self.get_json(self.url(&["api", "tickets"])).await
    }

    pub async fn ticket(&self, id: &str) -> Result<Ticket> {
        self.get_json(self.url(&["api", "tickets", id])).await
    }

    pub async fn ticket_diff(&self, id: &str) -> Result<TicketDiff> {
        self.get_json(self.url(&["api", "ticket-diff", id])).await
    }

    pub async fn developer_health(&self) -> Result<DeveloperHealth> {
        self.get_json(self.url(&["api", "developer-health"])).await
    }

    pub async fn engine_status(&self) -> Result<EngineStatus> {
        self.get_json(self.url(&["api", "engine-status"])).await
    }

    pub async fn detect(&self, field: &str) -> Result<DetectResult> {
        self.get_json(self.url(&["api", "detect", field])).await
    }

    pub async fn device_ips(&self, scan: bool) -> Result<DeviceIps> {
        let mut url = self.url(&["api", "device-ips"]);
        if scan {
            url.query_pairs_mut().append_pair("scan", "1");
        }
        tracing::trace!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .timeout(if scan { SCAN_TIMEOUT } else { REQUEST_TIMEOUT })
            .send()
            .await
            .context("GET /api/device-ips")?;
        if !response.status().is_success() {
            return Err(anyhow!("device scan failed with status: {}", response.status()));
        }
        response.json().await.context("decoding /api/device-ips")
    }

    pub async fn process_action(
        &self,
        action: &ProcessAction,
        name: &str,
    ) -> Result<ProcessActionResult> {
        let url = self.url(&["api", "process", action.as_str(), name]);
        self.post_json(url, &action.body()).await
    }

    /// Run a wizard action over plain HTTP (used by the one-shot CLI)
    pub async fn action(&self, value: &str, form: &FormSnapshot) -> Result<ActionResponse> {
        let body = ActionRequest {
            action: value,
            form,
        };
        self.post_json(self.url(&["api", "action"]), &body).await
    }

    /// Fetch `{options}` from an action-grid command's `options_endpoint`
    pub async fn options(&self, endpoint: &str) -> Result<Vec<SelectOption>> {
        let url = self
            .base_url
            .join(endpoint)
            .with_context(|| format!("invalid options endpoint: {}", endpoint))?;
        let response: OptionsResponse = self.get_json(url).await?;
        Ok(response.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = WizardClient::new("http://localhost:5050").unwrap();
        assert_eq!(
            client.url(&["api", "ticket-diff", "T-0001"]).as_str(),
            "http://localhost:5050/api/ticket-diff/T-0001"
        );
        assert_eq!(
            client.url(&["api", "process", "stop", "a b"]).as_str(),
            "http://localhost:5050/api/process/stop/a%20b"
        );

        let prefixed = WizardClient::new("http://host/wizard/").unwrap();
        assert_eq!(
            prefixed.url(&["api", "stats"]).as_str(),
            "http://host/wizard/api/stats"
        );
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(WizardClient::new("not a url").is_err());
    }
}
