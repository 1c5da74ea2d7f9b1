use anyhow::Context;
use bootstrap_core::discovery::Info;
use bootstrap_core::DiscoveryClient;
use clap::Args;

use crate::output;

#[derive(Args)]
pub struct RegisterArgs {
    /// Discovery cluster URL
    #[arg(long = "discovery", env = "CLUSTER_URL")]
    cluster_url: String,

    /// URL of this host's API
    #[arg(long)]
    url: String,

    /// Host name
    #[arg(long)]
    name: String,
}

pub fn run(args: RegisterArgs, json: bool) -> anyhow::Result<()> {
    let info = Info {
        cluster_url: args.cluster_url,
        instance_url: args.url,
        name: args.name,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let id = rt
        .block_on(DiscoveryClient::default().register_instance(&info))
        .with_context(|| format!("failed to register with {}", info.cluster_url))?;

    if json {
        output::print_json(&serde_json::json!({ "id": id }))?;
    } else {
        println!("{id}");
    }
    Ok(())
}
