use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Job ──────────────────────────────────────────────────────────────────

/// A job specification as submitted to a host with `PUT /host/jobs/:id`.
///
/// The id is host-scoped: submitting the same id twice is idempotent on the
/// host side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub artifact: JobArtifact,
    #[serde(default)]
    pub config: ContainerConfig,
    #[serde(default, skip_serializing_if = "Resources::is_empty")]
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobArtifact {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
    /// Host paths bind-mounted into the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeBinding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    pub location: String,
    pub target: String,
    #[serde(default)]
    pub writeable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub proto: String,
}

// ─── Resources ────────────────────────────────────────────────────────────

/// Default memory limit applied to jobs that do not declare one: 1 GiB.
pub const DEFAULT_MEMORY_LIMIT: i64 = 1024 * 1024 * 1024;

/// Default open file descriptor limit.
pub const DEFAULT_MAX_FD: i64 = 10_000;

pub const RESOURCE_MEMORY: &str = "memory";
pub const RESOURCE_MAX_FD: &str = "max_fd";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<i64>,
}

/// Per-job resource limits keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(pub BTreeMap<String, ResourceSpec>);

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.0.get(name)
    }

    /// Fill in default limits for any resource without an explicit one.
    /// Explicit values are never overwritten.
    pub fn set_defaults(&mut self) {
        for (name, default) in [
            (RESOURCE_MEMORY, DEFAULT_MEMORY_LIMIT),
            (RESOURCE_MAX_FD, DEFAULT_MAX_FD),
        ] {
            let spec = self.0.entry(name.to_string()).or_default();
            if spec.limit.is_none() {
                spec.limit = Some(default);
            }
        }
    }
}

// ─── Volumes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub target: String,
    pub volume_id: String,
    #[serde(default)]
    pub writeable: bool,
}

// ─── ActiveJob ────────────────────────────────────────────────────────────

/// Lifecycle status of a job on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Running,
    Done,
    Crashed,
    Failed,
}

/// A job as tracked by the host, returned by `GET /host/jobs/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job: Job,
    #[serde(default)]
    pub host_id: String,
    pub status: JobStatus,
    /// Host-recorded failure detail, if the job failed to launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
}

// ─── Events ───────────────────────────────────────────────────────────────

/// Lifecycle transition reported on a host event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Start,
    Stop,
    Error,
    Cleanup,
    /// Any event kind this client does not know about; safe to ignore.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: EventKind,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<ActiveJob>,
}

impl Event {
    pub fn new(event: EventKind, job_id: impl Into<String>) -> Self {
        Self {
            event,
            job_id: job_id.into(),
            job: None,
        }
    }

    /// `start` and `stop` both confirm that the host accepted and ran the job.
    pub fn is_launch_confirmation(&self) -> bool {
        matches!(self.event, EventKind::Start | EventKind::Stop)
    }
}
