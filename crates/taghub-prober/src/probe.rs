//! Reachability checks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ProbeError;

/// Fetches a URL and reports the response status.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Status code of a GET on `url`, or a transport error message.
    async fn status_of(&self, url: &str) -> Result<u16, String>;
}

/// Probe that issues one HTTP GET per call.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Build a probe whose connections give up after `connect_timeout`.
    ///
    /// The overall deadline is enforced by the prober per task.
    pub fn new(connect_timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(taghub_ingest::USER_AGENT)
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn status_of(&self, url: &str) -> Result<u16, String> {
        self.client
            .get(url)
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| e.to_string())
    }
}
