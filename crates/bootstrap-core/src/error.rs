use host_client::HostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("the minimum number of hosts for a multi-node cluster is 3, min-hosts={0} is invalid")]
    InvalidMinHosts(usize),

    #[error("bootstrap: artifact must be set")]
    MissingArtifact,

    #[error("bootstrap: release must be set")]
    MissingRelease,

    #[error("timed out waiting for {required} hosts to come online (currently {online} online)")]
    HostTimeout { required: usize, online: usize },

    #[error("error discovering cluster: {0}")]
    Discovery(String),

    #[error("bootstrap: unknown action {0:?}")]
    UnknownAction(String),

    #[error("bootstrap: invalid payload for step {step:?}: {source}")]
    Decode {
        step: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bootstrap: no recorded app data for step {0:?}")]
    AppStepNotFound(String),

    #[error("bootstrap: cannot interpolate {placeholder:?}: {reason}")]
    Interpolate { placeholder: String, reason: String },

    #[error("bootstrap: host error while launching job: {0:?}")]
    HostJobError(String),

    #[error("bootstrap: unknown error from host")]
    UnknownHostError,

    #[error("bootstrap: host job stream disconnected unexpectedly: {0:?}")]
    StreamDisconnected(String),

    #[error("bootstrap: job {job_id} on host {host_id} did not start within {secs}s")]
    LaunchTimeout {
        host_id: String,
        job_id: String,
        secs: u64,
    },

    #[error("bootstrap: not enough hosts: {required} required, {online} known")]
    NotEnoughHosts { required: usize, online: usize },

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to provision resource from {url}: {reason}")]
    Provision { url: String, reason: String },

    #[error("timed out waiting for {url}: {reason}")]
    Wait { url: String, reason: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
