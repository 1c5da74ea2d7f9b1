//! Cluster readiness gate: block until enough hosts have joined.

use std::sync::Arc;
use std::time::Duration;

use host_client::{Host, HostClient};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::discovery::{DiscoveryClient, Instance};
use crate::error::{BootstrapError, Result};

/// Turns a discovered instance into a host handle.
pub trait HostConnector: Send + Sync {
    fn connect(&self, instance: &Instance) -> Arc<dyn Host>;
}

/// Connects over the host HTTP API, using the instance name as the host id.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl HostConnector for HttpConnector {
    fn connect(&self, instance: &Instance) -> Arc<dyn Host> {
        Arc::new(HostClient::with_http(
            instance.name.clone(),
            instance.url.clone(),
            self.http.clone(),
        ))
    }
}

pub struct ReadinessGate {
    discovery: DiscoveryClient,
    connector: Arc<dyn HostConnector>,
    deadline: Duration,
    poll_interval: Duration,
}

impl ReadinessGate {
    pub fn new(
        discovery: DiscoveryClient,
        connector: Arc<dyn HostConnector>,
        deadline: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            discovery,
            connector,
            deadline,
            poll_interval,
        }
    }

    /// Poll `cluster_url` until at least `min` instances are registered and
    /// return a handle for each of them.
    pub async fn await_hosts(&self, cluster_url: &str, min: usize) -> Result<Vec<Arc<dyn Host>>> {
        if min == 2 {
            return Err(BootstrapError::InvalidMinHosts(min));
        }

        let start = Instant::now();
        loop {
            let instances = self
                .discovery
                .get_cluster(cluster_url)
                .await
                .map_err(|e| match e {
                    BootstrapError::Discovery(msg) => BootstrapError::Discovery(msg),
                    other => BootstrapError::Discovery(other.to_string()),
                })?;

            let online = instances.len();
            if online >= min {
                info!(online, required = min, "cluster hosts online");
                return Ok(instances
                    .iter()
                    .map(|inst| self.connector.connect(inst))
                    .collect());
            }

            if start.elapsed() >= self.deadline {
                return Err(BootstrapError::HostTimeout {
                    required: min,
                    online,
                });
            }
            debug!(online, required = min, "waiting for hosts");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
