mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{init::InitArgs, register::RegisterArgs, run::RunArgs};

#[derive(Parser)]
#[command(
    name = "bootstrap",
    about = "Bootstrap a cluster from a manifest and prepare hosts to join it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bootstrap manifest against the cluster
    Run(RunArgs),

    /// Write the host config, optionally minting a discovery token
    Init(InitArgs),

    /// Register this host with a discovery cluster
    Register(RegisterArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => cmd::run::run(args, cli.json),
        Commands::Init(args) => cmd::init::run(args, cli.json),
        Commands::Register(args) => cmd::register::run(args, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
