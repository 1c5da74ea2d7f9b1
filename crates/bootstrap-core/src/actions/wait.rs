use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

use crate::action::Action;
use crate::error::{BootstrapError, Result};
use crate::state::State;

const POLL: Duration = Duration::from_millis(500);
const LOOKUP_WAIT: Duration = Duration::from_secs(1);

/// Poll an HTTP endpoint until it answers with the expected status.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitAction {
    pub id: String,
    pub url: String,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_status")]
    pub status: u16,
}

fn default_timeout() -> u64 {
    60
}

fn default_status() -> u16 {
    200
}

impl WaitAction {
    async fn resolve_url(&self, state: &mut State) -> Result<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| BootstrapError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        let is_discoverd = url
            .host_str()
            .is_some_and(|h| h.ends_with(".discoverd"));
        if is_discoverd {
            if let Some(d) = state.discoverd() {
                d.lookup_url_host(&mut url, LOOKUP_WAIT).await?;
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Action for WaitAction {
    async fn run(&mut self, state: &mut State) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.timeout);
        let http = reqwest::Client::new();

        loop {
            let last = match self.resolve_url(state).await {
                Ok(url) => match http.get(url.clone()).send().await {
                    Ok(res) if res.status().as_u16() == self.status => {
                        debug!(url = %url, "wait satisfied");
                        return Ok(());
                    }
                    Ok(res) => format!("unexpected status {}", res.status().as_u16()),
                    Err(e) => e.to_string(),
                },
                Err(e @ BootstrapError::InvalidUrl { .. }) => return Err(e),
                Err(e) => e.to_string(),
            };

            if Instant::now() >= deadline {
                return Err(BootstrapError::Wait {
                    url: self.url.clone(),
                    reason: last,
                });
            }
            tokio::time::sleep(POLL).await;
        }
    }
}
