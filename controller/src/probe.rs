use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use tracing::debug;

/// Internet reachability check shown on the status page. Never consulted by the
/// control loop.
pub struct ConnectivityProbe {
    client: reqwest::Client,
    url: String,
}

impl ConnectivityProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build connectivity probe client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status() == StatusCode::NO_CONTENT,
            Err(err) => {
                debug!("connectivity probe to {} failed: {err}", self.url);
                false
            }
        }
    }
}
