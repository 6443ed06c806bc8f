use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::args::ProbeArgs;
use commands::check::OutputFormat;

#[derive(Parser)]
#[command(
    name = "dcprobe",
    about = "dcprobe — domain controller connectivity probe",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the domain once and retry in a burst if the bind is slow.
    ///
    /// Each run appends one row to <log-dir>/<machine>.csv. Probe failures
    /// are recorded, never fatal; the only fatal error is a log directory
    /// that cannot be created.
    Check {
        #[command(flatten)]
        probe: ProbeArgs,
        /// Per-run output on stdout
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        probe: ProbeArgs,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Check { probe, format } => {
            let config = probe.resolve()?;
            // One run at a time; no worker threads needed.
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::check::check(config, format))
        }
        Commands::Config { probe } => commands::config::show(&probe.resolve()?),
    }
}
