use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bootstrap_core::{ActionRegistry, Bootstrap, BootstrapConfig};
use clap::Args;
use tokio::sync::mpsc;

use crate::output;

#[derive(Args)]
pub struct RunArgs {
    /// Manifest file, or `-` for stdin
    manifest: PathBuf,

    /// Number of hosts that must be online before any step runs
    #[arg(long)]
    min_hosts: Option<usize>,

    /// Discovery cluster URL to wait on for hosts
    #[arg(long = "discovery")]
    cluster_url: Option<String>,

    /// discoverd base URL (default: ping 127.0.0.1:1111, resolve via the first host)
    #[arg(long = "discoverd")]
    discoverd_url: Option<String>,

    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on a job that has not started after this many seconds
    #[arg(long)]
    job_timeout: Option<u64>,
}

impl RunArgs {
    /// Defaults, then the config file, then the environment, then flags.
    fn resolve_config(&self) -> anyhow::Result<BootstrapConfig> {
        let mut config = match &self.config {
            Some(path) => BootstrapConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => BootstrapConfig::default(),
        };
        config.apply_env();

        if let Some(n) = self.min_hosts {
            config.min_hosts = n;
        }
        if let Some(url) = &self.cluster_url {
            config.cluster_url = url.clone();
        }
        if let Some(url) = &self.discoverd_url {
            config.discoverd_url = Some(url.clone());
        }
        if let Some(secs) = self.job_timeout {
            config.job_timeout_secs = Some(secs);
        }
        Ok(config)
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read manifest from stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read manifest {}", path.display()))
}

pub fn run(args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = args.resolve_config()?;
    let manifest = read_manifest(&args.manifest)?;
    let bootstrap = Bootstrap::new(config, ActionRegistry::builtin());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (tx, mut rx) = mpsc::channel(16);
        let printer = tokio::spawn(async move {
            while let Some(info) = rx.recv().await {
                output::print_step(&info, json)?;
            }
            anyhow::Ok(())
        });

        let result = bootstrap.run(&manifest, tx).await;
        printer.await??;
        result.context("bootstrap failed")
    })
}
