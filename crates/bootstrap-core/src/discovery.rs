//! Client for the cluster discovery service.
//!
//! Hosts register themselves under a cluster URL (the discovery token) and
//! the readiness gate lists that cluster until enough instances appear.
//!
//! | operation | request | success |
//! |---|---|---|
//! | list | `GET <cluster>` | 200 `{data: [Instance]}` |
//! | register | `POST <cluster>/instances` | 201 `{data: Instance}` |
//! | new token | `POST <base>/clusters` | 201, `Location` header |

use chrono::{DateTime, Utc};
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BootstrapError, Result};

/// Public discovery service used when minting new cluster tokens.
pub const DEFAULT_DISCOVERY_BASE: &str = "https://discovery.flynn.io";

/// SSH host key types published with an instance registration.
const SSH_KEY_TYPES: [&str; 4] = ["dsa", "rsa", "ecdsa", "ed25519"];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flynn_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_public_keys: Vec<SshPublicKey>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// An SSH host public key. `data` is the base64 key blob exactly as it
/// appears in the `.pub` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshPublicKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// What a host announces about itself when joining a cluster.
#[derive(Debug, Clone)]
pub struct Info {
    pub cluster_url: String,
    pub instance_url: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// DiscoveryClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
    ssh_dir: PathBuf,
}

impl Default for DiscoveryClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl DiscoveryClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            ssh_dir: PathBuf::from("/etc/ssh"),
        }
    }

    /// Read SSH host keys from `dir` instead of `/etc/ssh`.
    pub fn with_ssh_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ssh_dir = dir.into();
        self
    }

    /// List the instances currently registered under `cluster_url`.
    pub async fn get_cluster(&self, cluster_url: &str) -> Result<Vec<Instance>> {
        let res = self.http.get(cluster_url).send().await?;
        if res.status() != StatusCode::OK {
            return Err(status_error("GET", cluster_url, res.status()));
        }
        let body: Envelope<Vec<Instance>> = res.json().await?;
        Ok(body.data)
    }

    /// Register this host under `info.cluster_url`, returning the assigned id.
    pub async fn register_instance(&self, info: &Info) -> Result<String> {
        let instance = Instance {
            name: info.name.clone(),
            url: info.instance_url.clone(),
            ssh_public_keys: read_ssh_keys(&self.ssh_dir),
            flynn_version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        };

        let uri = format!("{}/instances", info.cluster_url.trim_end_matches('/'));
        let res = self
            .http
            .post(&uri)
            .json(&Envelope { data: instance })
            .send()
            .await?;
        if res.status() != StatusCode::CREATED {
            return Err(status_error("POST", &uri, res.status()));
        }
        let body: Envelope<Instance> = res.json().await?;
        Ok(body.data.id)
    }

    /// Mint a new cluster token at `base` (see [`DEFAULT_DISCOVERY_BASE`]).
    pub async fn new_token(&self, base: &str) -> Result<String> {
        let uri = format!("{}/clusters", base.trim_end_matches('/'));
        let agent = format!(
            "bootstrap/{} {}-{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let res = self.http.post(&uri).header(USER_AGENT, agent).send().await?;
        if res.status() != StatusCode::CREATED {
            return Err(status_error("POST", &uri, res.status()));
        }
        Ok(res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string())
    }
}

fn status_error(method: &str, uri: &str, status: StatusCode) -> BootstrapError {
    BootstrapError::Discovery(format!(
        "{method} {uri}: unexpected status {}",
        status.as_u16()
    ))
}

/// Collect the host's public SSH keys. Missing or malformed files are skipped.
fn read_ssh_keys(dir: &Path) -> Vec<SshPublicKey> {
    let mut keys = Vec::with_capacity(SSH_KEY_TYPES.len());
    for kind in SSH_KEY_TYPES {
        let path = dir.join(format!("ssh_host_{kind}_key.pub"));
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping ssh host key");
                continue;
            }
        };
        // "<algorithm> <base64 blob> [comment]"
        match content.split_whitespace().nth(1) {
            Some(blob) => keys.push(SshPublicKey {
                kind: kind.to_string(),
                data: blob.to_string(),
            }),
            None => debug!(path = %path.display(), "malformed ssh host key"),
        }
    }
    keys
}
