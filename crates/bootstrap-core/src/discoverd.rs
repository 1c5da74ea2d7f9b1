//! Minimal client for the in-cluster service registry (discoverd).
//!
//! Only the two calls the bootstrap needs: a liveness ping, and listing the
//! instances of a service so `<service>.discoverd` hostnames in provider
//! and wait URLs can be resolved to concrete addresses.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{BootstrapError, Result};

/// Port discoverd listens on, on every host.
pub const DISCOVERD_PORT: u16 = 1111;

/// Address pinged before a run when no discoverd URL is configured.
pub const DEFAULT_DISCOVERD_URL: &str = "http://127.0.0.1:1111";

const DISCOVERD_SUFFIX: &str = ".discoverd";
const LOOKUP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub addr: String,
    #[serde(default)]
    pub proto: String,
}

#[derive(Debug, Clone)]
pub struct DiscoverdClient {
    base_url: String,
    http: reqwest::Client,
}

impl DiscoverdClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Client for the discoverd instance co-located with a host at `host_addr`
    /// (`ip:port`).
    pub fn for_host_addr(host_addr: &str) -> Self {
        let ip = host_addr
            .rsplit_once(':')
            .map(|(ip, _)| ip)
            .unwrap_or(host_addr);
        Self::new(format!("http://{ip}:{DISCOVERD_PORT}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        let res = self.http.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(BootstrapError::Discovery(format!(
                "GET {url}: unexpected status {}",
                res.status().as_u16()
            )));
        }
        Ok(())
    }

    /// List instances of `service`, polling until at least one is registered
    /// or `wait` elapses. An empty list is returned on expiry.
    pub async fn instances(&self, service: &str, wait: Duration) -> Result<Vec<ServiceInstance>> {
        let url = format!("{}/services/{}/instances", self.base_url, service);
        let deadline = Instant::now() + wait;
        loop {
            let res = self.http.get(&url).send().await?;
            let instances: Vec<ServiceInstance> = if res.status().is_success() {
                res.json().await?
            } else {
                Vec::new()
            };
            if !instances.is_empty() || Instant::now() >= deadline {
                return Ok(instances);
            }
            debug!(service, "no instances registered yet");
            tokio::time::sleep(LOOKUP_POLL).await;
        }
    }

    /// Rewrite a `<service>.discoverd` host in `url` to the address of the
    /// first registered instance. URLs with any other host are left untouched.
    pub async fn lookup_url_host(&self, url: &mut Url, wait: Duration) -> Result<()> {
        let service = match url.host_str().and_then(|h| h.strip_suffix(DISCOVERD_SUFFIX)) {
            Some(s) => s.to_string(),
            None => return Ok(()),
        };

        let instances = self.instances(&service, wait).await?;
        let addr = instances
            .first()
            .map(|i| i.addr.clone())
            .ok_or_else(|| {
                BootstrapError::Discovery(format!("no instances of service {service:?}"))
            })?;

        let (host, port) = match addr.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), p.parse::<u16>().ok()),
            None => (addr.clone(), None),
        };
        let original = url.to_string();
        let invalid = |reason: String| BootstrapError::InvalidUrl {
            url: original.clone(),
            reason,
        };
        url.set_host(Some(&host)).map_err(|e| invalid(e.to_string()))?;
        if port.is_some() {
            url.set_port(port)
                .map_err(|_| invalid(format!("cannot set port from {addr:?}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_host_addr_uses_discoverd_port() {
        let c = DiscoverdClient::for_host_addr("10.0.0.1:1113");
        assert_eq!(c.base_url(), "http://10.0.0.1:1111");
    }

    #[tokio::test]
    async fn ping_ok() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/ping").with_status(200).create_async().await;
        DiscoverdClient::new(server.url()).ping().await.unwrap();
    }

    #[tokio::test]
    async fn ping_failure_is_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/ping").with_status(503).create_async().await;
        assert!(DiscoverdClient::new(server.url()).ping().await.is_err());
    }

    #[tokio::test]
    async fn lookup_rewrites_discoverd_host() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/services/pg-api/instances")
            .with_status(200)
            .with_body(r#"[{"addr":"10.0.0.7:5555","proto":"tcp"}]"#)
            .create_async()
            .await;

        let c = DiscoverdClient::new(server.url());
        let mut url = Url::parse("http://pg-api.discoverd/databases").unwrap();
        c.lookup_url_host(&mut url, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.7:5555/databases");
    }

    #[tokio::test]
    async fn lookup_leaves_other_hosts_alone() {
        let c = DiscoverdClient::new("http://127.0.0.1:1");
        let mut url = Url::parse("http://example.com/x").unwrap();
        c.lookup_url_host(&mut url, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(url.as_str(), "http://example.com/x");
    }

    #[tokio::test]
    async fn lookup_without_instances_fails_after_wait() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/services/pg-api/instances")
            .with_status(200)
            .with_body("[]")
            .expect_at_least(1)
            .create_async()
            .await;

        let c = DiscoverdClient::new(server.url());
        let mut url = Url::parse("http://pg-api.discoverd/databases").unwrap();
        let err = c
            .lookup_url_host(&mut url, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pg-api"));
    }
}
