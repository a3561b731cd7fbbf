use crate::config::AgentConfig;
use std::time::Duration;
use yamon_collector::RegistrySnapshot;
use yamon_common::error::MetricError;
use yamon_common::types::MetricEnvelope;
use yamon_common::HashKey;

/// Longest response body kept in a [`ReportError::Status`].
const MAX_BODY_LENGTH: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to sign metric: {0}")]
    Sign(#[from] MetricError),
}

/// Pushes registry snapshots to the server's batch endpoint.
pub struct Reporter {
    client: reqwest::Client,
    endpoint: String,
    key: Option<HashKey>,
}

impl Reporter {
    pub fn new(
        address: &str,
        key: Option<HashKey>,
        timeout: Duration,
    ) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/updates/", base_url(address)),
            key,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, ReportError> {
        Self::new(&config.address, config.hash_key(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Converts a snapshot into wire envelopes, signing each one when a key
    /// is configured. Counters carry running totals.
    pub fn build_batch(
        &self,
        snapshot: &RegistrySnapshot,
    ) -> Result<Vec<MetricEnvelope>, ReportError> {
        let mut batch: Vec<MetricEnvelope> = snapshot
            .gauges
            .iter()
            .map(MetricEnvelope::from)
            .chain(snapshot.counters.iter().map(MetricEnvelope::from))
            .collect();
        if let Some(key) = &self.key {
            for envelope in &mut batch {
                envelope.sign(key)?;
            }
        }
        Ok(batch)
    }

    /// Sends one batch. Returns the number of metrics the server accepted.
    ///
    /// There is no retry: the next cycle resends the then-current totals.
    pub async fn report(&self, snapshot: &RegistrySnapshot) -> Result<usize, ReportError> {
        let batch = self.build_batch(snapshot)?;
        if batch.is_empty() {
            return Ok(0);
        }
        let body = serde_json::to_vec(&batch)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(text) => truncate(&text, MAX_BODY_LENGTH),
                Err(e) => format!("[Failed to read response body: {e}]"),
            };
            return Err(ReportError::Status { status, body });
        }
        Ok(batch.len())
    }
}

/// Normalizes `host:port` or a URL into a base URL without trailing slash.
fn base_url(address: &str) -> String {
    let addr = address.trim().trim_end_matches('/');
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
