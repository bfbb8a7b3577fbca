//! Best-effort mirror of the section store on the development sync server.
//!
//! The server exposes `GET/POST /api/data/sitedata`, scoped by the
//! `X-Tenant-Id` header. A 404 means the endpoint is not available and is
//! not an error.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::SectionStore;

pub const SYNC_PATH: &str = "/api/data/sitedata";

pub const TENANT_HEADER: &str = "X-Tenant-Id";

/// Sync is a convenience; do not hold up the console for a slow dev server.
const SYNC_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct RemoteSync {
    client: Client,
    endpoint: String,
    tenant_id: Option<String>,
}

impl RemoteSync {
    pub fn new(base_url: &str, tenant_id: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SYNC_TIMEOUT_SECS))
            .build()
            .context("Failed to create sync HTTP client")?;
        Ok(Self {
            client,
            endpoint: Self::endpoint_for(base_url),
            tenant_id,
        })
    }

    fn endpoint_for(base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), SYNC_PATH)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tenant_id {
            Some(ref tenant) => builder.header(TENANT_HEADER, tenant),
            None => builder,
        }
    }

    /// Fetch the remote copy. `Ok(None)` when the server has nothing or no endpoint.
    pub async fn fetch(&self) -> Result<Option<SectionStore>> {
        let response = self
            .request(self.client.get(&self.endpoint))
            .send()
            .await
            .with_context(|| format!("Failed to reach sync server at {}", self.endpoint))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => {
                debug!(endpoint = %self.endpoint, "Sync endpoint has no data");
                Ok(None)
            }
            status if status.is_success() => {
                let text = response.text().await.context("Failed to read sync response")?;
                if text.trim().is_empty() || text.trim() == "null" {
                    return Ok(None);
                }
                let store = serde_json::from_str(&text).context("Failed to parse sync response")?;
                Ok(Some(store))
            }
            status => Err(anyhow::anyhow!("Sync server returned {}", status)),
        }
    }

    /// Push the full store. A missing endpoint counts as success.
    pub async fn push(&self, store: &SectionStore) -> Result<()> {
        let response = self
            .request(self.client.post(&self.endpoint))
            .json(store)
            .send()
            .await
            .with_context(|| format!("Failed to reach sync server at {}", self.endpoint))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(endpoint = %self.endpoint, "Sync endpoint not available");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            status => Err(anyhow::anyhow!("Sync server returned {}", status)),
        }
    }
}
