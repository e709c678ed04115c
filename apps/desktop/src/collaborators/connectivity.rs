//! Network reachability checks.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::Connectivity;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Treats the network as always reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Probes a health endpoint; any successful response means online.
#[derive(Debug, Clone)]
pub struct HttpConnectivity {
    client: Client,
    url: String,
}

impl HttpConnectivity {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Connectivity for HttpConnectivity {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Connectivity probe to {} failed: {}", self.url, e);
                false
            }
        }
    }
}
