//! Application deployment units: app, artifact, release and process counts.

use host_client::{ContainerConfig, Job, JobArtifact, Port};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const META_APP_ID: &str = "flynn-controller.app";
pub const META_APP_NAME: &str = "flynn-controller.app_name";
pub const META_RELEASE: &str = "flynn-controller.release";
pub const META_TYPE: &str = "flynn-controller.type";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessType {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    /// Needs a persistent data volume mounted at `/data`.
    #[serde(default)]
    pub data: bool,
    #[serde(default)]
    pub omni: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Id of the artifact this release runs.
    #[serde(rename = "artifact", default, skip_serializing_if = "String::is_empty")]
    pub artifact_id: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub processes: BTreeMap<String, ProcessType>,
}

/// A formation with its app, release and artifact inlined.
///
/// `processes` is ordered so scheduling visits process types in a stable
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpandedFormation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub processes: BTreeMap<String, usize>,
}

/// A resource provider, e.g. a database API that hands out credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    /// Request body sent when provisioning. `{}` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

/// A provisioned resource and the env vars that connect an app to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Host-scoped job id: `<host-id>-<uuid>`.
pub fn generate_job_id(host_id: &str) -> String {
    format!("{host_id}-{}", Uuid::new_v4())
}

/// Build the job that runs one instance of process type `typ` on `host_id`.
///
/// Env precedence, lowest first: release env, process env, the
/// `FLYNN_*` identity vars.
pub fn job_config(
    app: &App,
    release: &Release,
    artifact: &Artifact,
    typ: &str,
    host_id: &str,
) -> Job {
    let proc = release.processes.get(typ).cloned().unwrap_or_default();

    let mut env = release.env.clone();
    env.extend(proc.env);
    env.insert("FLYNN_APP_ID".into(), app.id.clone());
    env.insert("FLYNN_RELEASE_ID".into(), release.id.clone());
    env.insert("FLYNN_PROCESS_TYPE".into(), typ.to_string());

    let metadata = BTreeMap::from([
        (META_APP_ID.to_string(), app.id.clone()),
        (META_APP_NAME.to_string(), app.name.clone()),
        (META_RELEASE.to_string(), release.id.clone()),
        (META_TYPE.to_string(), typ.to_string()),
    ]);

    Job {
        id: generate_job_id(host_id),
        metadata,
        artifact: JobArtifact {
            kind: artifact.kind.clone(),
            uri: artifact.uri.clone(),
        },
        config: ContainerConfig {
            cmd: proc.cmd,
            entrypoint: proc.entrypoint,
            env,
            ports: proc.ports,
            mounts: Vec::new(),
            volumes: Vec::new(),
        },
        resources: Default::default(),
    }
}
