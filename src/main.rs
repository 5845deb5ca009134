use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "stackyard")]
#[command(
    version,
    about = "Converge a Docker Swarm cluster to a declared set of stacks"
)]
pub struct Cli {
    /// Show per-stack resolution lines and info-level logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Format of diagnostic logs on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one convergence pass against the local swarm
    Converge(ConvergeArgs),
    /// Create the stack catalog and overrides directory
    Init,
    /// View or validate settings
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ConvergeArgs {
    /// Query the cluster but skip every mutating call and file write
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Maximum concurrent stack deploys
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Timeout in seconds for each docker call
    #[arg(long, value_name = "SECS")]
    pub call_timeout: Option<u64>,

    /// Shared overlay network name
    #[arg(long)]
    pub network: Option<String>,

    /// Swarm advertise address (skips auto-detection)
    #[arg(long)]
    pub advertise_addr: Option<Ipv4Addr>,

    /// Docker binary to invoke
    #[arg(long)]
    pub docker_bin: Option<String>,

    /// Environment variable holding the base64 cluster configuration
    #[arg(long, value_name = "VAR")]
    pub config_env: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Validate settings and show any warnings
    Validate,
}

fn initialize_tracing(verbose: bool, format: LogFormat) {
    let default_directive = if verbose { "stackyard=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    initialize_tracing(cli.verbose, cli.log_format);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Converge(args) => cmd::cmd_converge(project_dir, &cli, args).await,
        Commands::Init => {
            cmd::cmd_init(project_dir)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { command } => {
            cmd::cmd_config(project_dir, command.clone())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
