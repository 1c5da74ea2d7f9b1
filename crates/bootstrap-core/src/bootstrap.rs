//! Manifest executor.
//!
//! A run waits for the cluster's hosts (the implicit `online-hosts` step),
//! then executes the manifest's steps strictly in order. Progress is
//! reported as [`StepInfo`] events on an mpsc channel; the sender is dropped
//! when the run returns, which is how the consumer learns the run is over.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::action::{ActionRegistry, StepAction};
use crate::config::BootstrapConfig;
use crate::discoverd::{DiscoverdClient, DEFAULT_DISCOVERD_URL};
use crate::discovery::DiscoveryClient;
use crate::error::{BootstrapError, Result};
use crate::gate::{HostConnector, HttpConnector, ReadinessGate};
use crate::state::State;

/// Id of the step that waits for hosts before any manifest step runs.
pub const ONLINE_HOSTS_STEP: &str = "online-hosts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Start,
    Done,
    Error,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepState::Start => "start",
            StepState::Done => "done",
            StepState::Error => "error",
        })
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    #[serde(flatten)]
    pub step: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

impl StepInfo {
    fn new(step: &StepAction, state: StepState) -> Self {
        Self {
            step: step.clone(),
            data: None,
            state,
            error: None,
            ts: Utc::now(),
        }
    }

    fn done(step: &StepAction, data: Option<Value>) -> Self {
        Self {
            data,
            ..Self::new(step, StepState::Done)
        }
    }

    fn failed(step: &StepAction, err: &BootstrapError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(step, StepState::Error)
        }
    }
}

pub struct Bootstrap {
    config: BootstrapConfig,
    registry: ActionRegistry,
    discovery: DiscoveryClient,
    connector: Arc<dyn HostConnector>,
    discoverd: Option<DiscoverdClient>,
}

impl Bootstrap {
    /// Build an executor from a fully resolved `config`.
    ///
    /// The environment is not read here: callers that honour `SINGLETON`,
    /// `DISCOVERD` and `CLUSTER_URL` call [`BootstrapConfig::apply_env`]
    /// before passing the config in, so flags applied afterwards still win.
    pub fn new(config: BootstrapConfig, registry: ActionRegistry) -> Self {
        let discoverd = config.discoverd_url.as_deref().map(DiscoverdClient::new);
        Self {
            config,
            registry,
            discovery: DiscoveryClient::default(),
            connector: Arc::new(HttpConnector::default()),
            discoverd,
        }
    }

    pub fn with_discovery(mut self, discovery: DiscoveryClient) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn HostConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_discoverd(mut self, discoverd: DiscoverdClient) -> Self {
        self.discoverd = Some(discoverd);
        self
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Execute `manifest` (a JSON array of step records), reporting progress
    /// on `events`.
    ///
    /// A failure is reported as exactly one `error` event carrying the step
    /// that was in effect, and returned. `events` is dropped before this
    /// returns in every case.
    pub async fn run(&self, manifest: &[u8], events: mpsc::Sender<StepInfo>) -> Result<()> {
        let mut current = StepAction::default();
        let result = self.execute(manifest, &events, &mut current).await;
        if let Err(e) = &result {
            error!(step = %current.id, action = %current.action, error = %e, "bootstrap failed");
            emit(&events, StepInfo::failed(&current, e)).await;
        }
        result
    }

    async fn execute(
        &self,
        manifest: &[u8],
        events: &mpsc::Sender<StepInfo>,
        current: &mut StepAction,
    ) -> Result<()> {
        let min_hosts = self.config.min_hosts;
        if min_hosts == 2 {
            return Err(BootstrapError::InvalidMinHosts(min_hosts));
        }

        let ping_target = self
            .discoverd
            .clone()
            .unwrap_or_else(|| DiscoverdClient::new(DEFAULT_DISCOVERD_URL));
        let strategy = self.config.discoverd_attempts.strategy();
        if let Err(e) = strategy.run(|| ping_target.ping()).await {
            warn!(url = ping_target.base_url(), error = %e, "discoverd not reachable, continuing");
        }

        let steps: Vec<Value> = serde_json::from_slice(manifest)?;

        let mut state = State::new(
            self.config.cluster_url.clone(),
            min_hosts,
            self.config.singleton(),
        );
        state.job_timeout = self.config.job_timeout();
        if let Some(d) = &self.discoverd {
            state.set_discoverd(d.clone());
        }

        *current = StepAction::new(ONLINE_HOSTS_STEP, "check");
        emit(events, StepInfo::new(current, StepState::Start)).await;
        let gate = ReadinessGate::new(
            self.discovery.clone(),
            Arc::clone(&self.connector),
            self.config.host_timeout(),
            self.config.poll_interval(),
        );
        state.hosts = gate.await_hosts(&state.cluster_url, min_hosts).await?;
        let hosts = json!({ "hosts": state.host_summaries() });
        state
            .step_data
            .insert(ONLINE_HOSTS_STEP.to_string(), hosts.clone());
        emit(events, StepInfo::done(current, Some(hosts))).await;

        for raw in steps {
            *current = serde_json::from_value(raw.clone())?;
            let mut action = self.registry.resolve(current, raw)?;

            info!(step = %current.id, action = %current.action, "step started");
            emit(events, StepInfo::new(current, StepState::Start)).await;

            action.run(&mut state).await?;

            let data = state.step_data.get(&current.id).cloned();
            info!(step = %current.id, "step done");
            emit(events, StepInfo::done(current, data)).await;
        }

        Ok(())
    }
}

/// Send an event; a consumer that went away does not stop the run.
async fn emit(events: &mpsc::Sender<StepInfo>, info: StepInfo) {
    let _ = events.send(info).await;
}
