//! Endpoint prober: fetches capability cards from candidate addresses.
//!
//! Every candidate is probed concurrently with its own timeout. A candidate
//! that is down, slow, or serving something other than an agent card is
//! simply absent from the result; probe failures are logged, never raised.

use agentmesh_config::DiscoveryConfig;
use agentmesh_core::error::{DiscoveryError, Error, Result};
use agentmesh_core::{AgentCard, AgentInfo};
use std::time::Duration;
use tracing::{debug, info};

/// Probes a fixed list of candidate addresses for agent cards.
pub struct EndpointProber {
    endpoints: Vec<String>,
    card_path: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl EndpointProber {
    pub fn new(
        endpoints: Vec<String>,
        card_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        let card_path = card_path.into();
        let card_path = if card_path.starts_with('/') {
            card_path
        } else {
            format!("/{card_path}")
        };

        Ok(Self {
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            card_path,
            timeout,
            client,
        })
    }

    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        Self::new(
            config.endpoints.clone(),
            &config.card_path,
            config.probe_timeout(),
        )
    }

    /// Candidate base addresses, without trailing slashes.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Probe a single address.
    pub async fn probe(&self, address: &str) -> std::result::Result<AgentInfo, DiscoveryError> {
        let base = address.trim_end_matches('/');
        let url = format!("{base}{}", self.card_path);
        debug!(url = %url, "Probing for agent card");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    address: base.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                DiscoveryError::Unreachable {
                    address: base.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DiscoveryError::UnexpectedStatus {
                address: base.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    address: base.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                DiscoveryError::Unreachable {
                    address: base.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let card: AgentCard =
            serde_json::from_str(&body).map_err(|e| DiscoveryError::MalformedCard {
                address: base.to_string(),
                reason: e.to_string(),
            })?;

        Ok(card.into_agent_info(base))
    }

    /// Probe every candidate concurrently. Returns agents in candidate order.
    pub async fn probe_all(&self) -> Vec<AgentInfo> {
        let probes = self.endpoints.iter().map(|address| self.probe(address));
        let outcomes = futures::future::join_all(probes).await;

        let mut found = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(agent) => {
                    info!(agent = %agent.name, url = %agent.url, skills = agent.skills.len(), "Discovered agent");
                    found.push(agent);
                }
                Err(e) => debug!(error = %e, "No agent at candidate"),
            }
        }
        found
    }
}
