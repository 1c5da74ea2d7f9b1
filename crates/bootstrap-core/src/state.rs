use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use host_client::Host;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::discoverd::DiscoverdClient;
use crate::formation::Provider;

/// Mutable context threaded through every step of one bootstrap run.
///
/// Created once per run and dropped at the end; never persisted. `hosts` is
/// filled once by the readiness gate and only read afterwards.
pub struct State {
    /// Result payload per step id, readable by later steps and the caller.
    pub step_data: HashMap<String, serde_json::Value>,
    pub providers: HashMap<String, Provider>,
    /// At most one instance per process type when set.
    pub singleton: bool,
    pub cluster_url: String,
    pub min_hosts: usize,
    pub hosts: Vec<Arc<dyn Host>>,
    /// Upper bound on a single job launch. `None` waits indefinitely.
    pub job_timeout: Option<Duration>,
    discoverd: Option<DiscoverdClient>,
}

/// `{id, addr}` summary of a host, as recorded in step data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSummary {
    pub id: String,
    pub addr: String,
}

impl State {
    pub fn new(cluster_url: impl Into<String>, min_hosts: usize, singleton: bool) -> Self {
        Self {
            step_data: HashMap::new(),
            providers: HashMap::new(),
            singleton,
            cluster_url: cluster_url.into(),
            min_hosts,
            hosts: Vec::new(),
            job_timeout: None,
            discoverd: None,
        }
    }

    /// Use an explicit discoverd endpoint instead of deriving one from the
    /// first host.
    pub fn set_discoverd(&mut self, client: DiscoverdClient) {
        self.discoverd = Some(client);
    }

    /// The discoverd client, defaulting to the instance on the first host.
    /// `None` until hosts are known.
    pub fn discoverd(&mut self) -> Option<&DiscoverdClient> {
        if self.discoverd.is_none() {
            let first = self.hosts.first()?;
            self.discoverd = Some(DiscoverdClient::for_host_addr(first.addr()));
        }
        self.discoverd.as_ref()
    }

    /// A uniformly shuffled copy of the host set.
    pub fn shuffled_hosts(&self) -> Vec<Arc<dyn Host>> {
        let mut hosts = self.hosts.clone();
        hosts.shuffle(&mut rand::thread_rng());
        hosts
    }

    pub fn host_summaries(&self) -> Vec<HostSummary> {
        self.hosts
            .iter()
            .map(|h| HostSummary {
                id: h.id().to_string(),
                addr: h.addr().to_string(),
            })
            .collect()
    }
}
