use std::path::{Path, PathBuf};

use anyhow::Context;
use bootstrap_core::discovery::DEFAULT_DISCOVERY_BASE;
use bootstrap_core::DiscoveryClient;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::output;

/// Default location of the host daemon's config.
pub const DEFAULT_HOST_CONFIG: &str = "/etc/flynn/host.json";

#[derive(Args)]
pub struct InitArgs {
    /// Create and join a new discovery token
    #[arg(long)]
    init_discovery: bool,

    /// Join the cluster with this discovery token
    #[arg(long)]
    discovery: Option<String>,

    /// Join the cluster using seed IPs (must already be bootstrapped)
    #[arg(long)]
    peers: Option<String>,

    /// External IP address of the host
    #[arg(long)]
    external: Option<String>,

    /// File to write to
    #[arg(long, default_value = DEFAULT_HOST_CONFIG)]
    file: PathBuf,

    /// Discovery service that mints new tokens
    #[arg(long, env = "DISCOVERY_BASE_URL", default_value = DEFAULT_DISCOVERY_BASE, hide = true)]
    discovery_base: String,
}

/// Arguments the host daemon is started with.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub args: Vec<String>,
}

impl HostConfig {
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_vec(self)?;
        std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn host_config(discovery: Option<&str>, external: Option<&str>, peers: Option<&str>) -> HostConfig {
    let mut config = HostConfig::default();
    let flags = [
        ("--discovery", discovery),
        ("--external", external),
        ("--peers", peers),
    ];
    for (flag, value) in flags {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            config.args.push(flag.to_string());
            config.args.push(v.to_string());
        }
    }
    config
}

pub fn run(args: InitArgs, json: bool) -> anyhow::Result<()> {
    let mut token = args.discovery.clone();
    if args.init_discovery {
        let rt = tokio::runtime::Runtime::new()?;
        let minted = rt
            .block_on(DiscoveryClient::default().new_token(&args.discovery_base))
            .context("failed to create discovery token")?;
        if !json {
            println!("{minted}");
        }
        token = Some(minted);
    }

    let config = host_config(
        token.as_deref(),
        args.external.as_deref(),
        args.peers.as_deref(),
    );
    config.write_to(&args.file)?;

    if json {
        output::print_json(&serde_json::json!({
            "file": args.file,
            "discovery": token,
            "args": config.args,
        }))?;
    }
    Ok(())
}
