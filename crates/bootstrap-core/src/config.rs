use crate::attempt::Strategy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Env var forcing singleton mode on (`"true"`) or off (anything else).
pub const ENV_SINGLETON: &str = "SINGLETON";
/// Env var naming the discoverd base URL, e.g. `http://127.0.0.1:1111`.
pub const ENV_DISCOVERD: &str = "DISCOVERD";
/// Env var naming the discovery cluster URL.
pub const ENV_CLUSTER_URL: &str = "CLUSTER_URL";

// ---------------------------------------------------------------------------
// AttemptConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptConfig {
    #[serde(default = "default_attempt_min")]
    pub min: u32,
    #[serde(default = "default_attempt_total_secs")]
    pub total_secs: u64,
    #[serde(default = "default_attempt_delay_ms")]
    pub delay_ms: u64,
}

fn default_attempt_min() -> u32 {
    5
}

fn default_attempt_total_secs() -> u64 {
    30
}

fn default_attempt_delay_ms() -> u64 {
    200
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            min: default_attempt_min(),
            total_secs: default_attempt_total_secs(),
            delay_ms: default_attempt_delay_ms(),
        }
    }
}

impl AttemptConfig {
    pub fn strategy(&self) -> Strategy {
        Strategy {
            min: self.min,
            total: Duration::from_secs(self.total_secs),
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// BootstrapConfig
// ---------------------------------------------------------------------------

/// Parameters for one bootstrap run.
///
/// Every field has a default, so an empty YAML document is a valid config.
/// Precedence (lowest first): defaults, config file, environment, CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub cluster_url: String,
    #[serde(default = "default_min_hosts")]
    pub min_hosts: usize,
    #[serde(default)]
    pub discoverd_url: Option<String>,
    /// Explicit singleton override; `None` means "derive from `min_hosts`".
    #[serde(default)]
    pub singleton: Option<bool>,
    #[serde(default = "default_host_timeout_secs")]
    pub host_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for a launched job to start. Unset waits forever.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub discoverd_attempts: AttemptConfig,
}

fn default_min_hosts() -> usize {
    1
}

fn default_host_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            cluster_url: String::new(),
            min_hosts: default_min_hosts(),
            discoverd_url: None,
            singleton: None,
            host_timeout_secs: default_host_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            job_timeout_secs: None,
            discoverd_attempts: AttemptConfig::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    /// Apply `SINGLETON`, `DISCOVERD` and `CLUSTER_URL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(s) = lookup(ENV_SINGLETON).filter(|s| !s.is_empty()) {
            self.singleton = Some(s == "true");
        }
        if let Some(url) = lookup(ENV_DISCOVERD).filter(|s| !s.is_empty()) {
            self.discoverd_url = Some(url);
        }
        if let Some(url) = lookup(ENV_CLUSTER_URL).filter(|s| !s.is_empty()) {
            self.cluster_url = url;
        }
    }

    /// Singleton mode: the explicit override wins, otherwise a one-host cluster.
    pub fn singleton(&self) -> bool {
        self.singleton.unwrap_or(self.min_hosts == 1)
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn singleton_defaults_from_min_hosts() {
        let mut c = BootstrapConfig::default();
        assert!(c.singleton());
        c.min_hosts = 3;
        assert!(!c.singleton());
    }

    #[test]
    fn singleton_env_overrides_min_hosts() {
        let mut c = BootstrapConfig::default();
        c.apply_env_from(env(&[(ENV_SINGLETON, "false")]));
        assert!(!c.singleton());

        let mut c = BootstrapConfig {
            min_hosts: 3,
            ..Default::default()
        };
        c.apply_env_from(env(&[(ENV_SINGLETON, "true")]));
        assert!(c.singleton());
    }

    #[test]
    fn empty_singleton_env_is_ignored() {
        let mut c = BootstrapConfig::default();
        c.apply_env_from(env(&[(ENV_SINGLETON, "")]));
        assert_eq!(c.singleton, None);
    }

    #[test]
    fn env_sets_urls() {
        let mut c = BootstrapConfig::default();
        c.apply_env_from(env(&[
            (ENV_DISCOVERD, "http://127.0.0.1:1111"),
            (ENV_CLUSTER_URL, "https://discovery.example/clusters/abc"),
        ]));
        assert_eq!(c.discoverd_url.as_deref(), Some("http://127.0.0.1:1111"));
        assert_eq!(c.cluster_url, "https://discovery.example/clusters/abc");
    }

    #[test]
    fn load_partial_yaml_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bootstrap.yaml");
        std::fs::write(&path, "min_hosts: 3\njob_timeout_secs: 90\n").unwrap();

        let c = BootstrapConfig::load(&path).unwrap();
        assert_eq!(c.min_hosts, 3);
        assert_eq!(c.job_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(c.poll_interval(), Duration::from_millis(200));
        assert_eq!(c.discoverd_attempts, AttemptConfig::default());
    }

    #[test]
    fn load_empty_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bootstrap.yaml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(BootstrapConfig::load(&path).unwrap(), BootstrapConfig::default());
    }
}
