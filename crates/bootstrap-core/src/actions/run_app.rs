//! `run-app`: deploy an application formation onto the cluster.
//!
//! The step payload is an expanded formation (`app`, `release`, `artifact`,
//! `processes`) plus optional resource providers. Running it provisions
//! every provider, then starts `processes[type]` instances of each process
//! type spread over the hosts. The step records `{...formation, providers,
//! resources, jobs}`, also when it fails part-way, so the caller sees what
//! was already created.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use host_client::{Host, VolumeBinding};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::error::{BootstrapError, Result};
use crate::formation::{job_config, App, ExpandedFormation, Provider, Resource};
use crate::interpolate::interpolate_release;
use crate::launch::{launch_job, JobRecord};
use crate::resource::provision;
use crate::state::State;

const PROVIDER_LOOKUP_WAIT: Duration = Duration::from_secs(1);
const DATA_VOLUME_TARGET: &str = "/data";

#[derive(Debug, Clone, Deserialize)]
pub struct RunAppAction {
    #[serde(flatten)]
    pub formation: ExpandedFormation,
    pub id: String,
    /// Id of an earlier `run-app` step whose app, release and artifact
    /// this step reuses.
    #[serde(default)]
    pub app_step: String,
    #[serde(default)]
    pub resources: Vec<Provider>,
}

/// What a `run-app` step records under its id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunAppState {
    #[serde(flatten)]
    pub formation: ExpandedFormation,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn app_step_data(state: &State, step: &str) -> Result<RunAppState> {
    let data = state
        .step_data
        .get(step)
        .ok_or_else(|| BootstrapError::AppStepNotFound(step.to_string()))?;
    Ok(serde_json::from_value(data.clone())?)
}

#[async_trait]
impl Action for RunAppAction {
    async fn run(&mut self, state: &mut State) -> Result<()> {
        if !self.app_step.is_empty() {
            let referenced = app_step_data(state, &self.app_step)?;
            let processes = std::mem::take(&mut self.formation.processes);
            self.formation = referenced.formation;
            self.formation.processes = processes;
        }

        let mut recorded = RunAppState {
            providers: Vec::with_capacity(self.resources.len()),
            resources: Vec::with_capacity(self.resources.len()),
            ..Default::default()
        };
        let result = self.deploy(state, &mut recorded).await;

        recorded.formation = self.formation.clone();
        state
            .step_data
            .insert(self.id.clone(), serde_json::to_value(&recorded)?);
        result
    }
}

impl RunAppAction {
    async fn deploy(&mut self, state: &mut State, recorded: &mut RunAppState) -> Result<()> {
        let f = &mut self.formation;

        let app = f.app.get_or_insert_with(App::default);
        if app.id.is_empty() {
            app.id = new_id();
        }
        let artifact = f.artifact.as_mut().ok_or(BootstrapError::MissingArtifact)?;
        if artifact.id.is_empty() {
            artifact.id = new_id();
        }
        let release = f.release.as_mut().ok_or(BootstrapError::MissingRelease)?;
        if release.id.is_empty() {
            release.id = new_id();
        }
        release.artifact_id = artifact.id.clone();
        interpolate_release(release, &state.step_data)?;

        let http = reqwest::Client::new();
        for provider in &self.resources {
            let url = resolve_provider_url(state, &provider.url).await?;
            let resource = provision(&http, &url, provider.config.as_ref()).await?;

            if let Some(release) = self.formation.release.as_mut() {
                release
                    .env
                    .extend(resource.env.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            let key = if provider.name.is_empty() {
                provider.url.clone()
            } else {
                provider.name.clone()
            };
            state.providers.insert(key, provider.clone());
            recorded.providers.push(provider.clone());
            recorded.resources.push(resource);
        }

        self.schedule(state, recorded).await
    }

    async fn schedule(&mut self, state: &State, recorded: &mut RunAppState) -> Result<()> {
        let f = &mut self.formation;
        let (Some(app), Some(release), Some(artifact)) = (&f.app, &f.release, &f.artifact) else {
            return Err(BootstrapError::MissingRelease);
        };

        let types: Vec<(String, usize)> =
            f.processes.iter().map(|(t, c)| (t.clone(), *c)).collect();
        for (typ, mut count) in types {
            if state.singleton && count > 1 {
                f.processes.insert(typ.clone(), 1);
                count = 1;
            }
            if count == 0 {
                continue;
            }

            let hosts = state.shuffled_hosts();
            if hosts.is_empty() {
                return Err(BootstrapError::NotEnoughHosts {
                    required: 1,
                    online: 0,
                });
            }
            let needs_data = release.processes.get(&typ).is_some_and(|p| p.data);

            for i in 0..count {
                let host: &Arc<dyn Host> = &hosts[i % hosts.len()];
                let mut job = job_config(app, release, artifact, &typ, host.id());
                job.resources.set_defaults();
                if needs_data {
                    let volume = host.create_volume().await?;
                    job.config.volumes.push(VolumeBinding {
                        target: DATA_VOLUME_TARGET.to_string(),
                        volume_id: volume.id,
                        writeable: true,
                    });
                }
                let record = launch_job(Arc::clone(host), &job, state.job_timeout).await?;
                recorded.jobs.push(record);
            }
            info!(app = %app.name, process = %typ, count, "process type started");
        }
        Ok(())
    }
}

/// Resolve a `<service>.discoverd` provider host through discoverd.
async fn resolve_provider_url(state: &mut State, raw: &str) -> Result<String> {
    let mut url = Url::parse(raw).map_err(|e| BootstrapError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_some_and(|h| h.ends_with(".discoverd")) {
        match state.discoverd() {
            Some(d) => d.lookup_url_host(&mut url, PROVIDER_LOOKUP_WAIT).await?,
            None => warn!(url = raw, "no discoverd available to resolve provider host"),
        }
    }
    Ok(url.to_string())
}
