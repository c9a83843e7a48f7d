//! meltgen CLI - deterministic MELT incident data generator.
//!
//! Commands:
//! - `meltgen generate` - Simulate the configured window and write all streams
//! - `meltgen init` - Write a default configuration file
//! - `meltgen list` - List incidents from a generated catalog
//! - `meltgen summary` - Summarize a generated catalog
//! - `meltgen map` - Collect every record belonging to one incident

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "meltgen")]
#[command(about = "Deterministic MELT telemetry and incident ground-truth generator")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate metrics, events, logs, traces and the incident catalog
    Generate {
        /// Path to a JSON or YAML configuration file
        #[arg(short, long, env = "MELTGEN_CONFIG")]
        config: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: String,

        /// Override the number of simulated days
        #[arg(long)]
        days: Option<u32>,

        /// Override the master seed
        #[arg(long, env = "MELTGEN_SEED")]
        seed: Option<u64>,

        /// Use provider-neutral metric names and host ids
        #[arg(long)]
        plain: bool,
    },

    /// Write a default configuration file
    Init {
        /// Destination (.json, .yaml or .yml)
        #[arg(default_value = "meltgen.json")]
        path: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List incidents from a generated catalog
    List {
        /// Output directory of a previous run
        #[arg(short, long, default_value = "output")]
        output: String,

        /// Only incidents of this type (e.g. CPU_SATURATION)
        #[arg(short = 't', long = "type")]
        incident_type: Option<String>,

        /// Only root causes
        #[arg(long)]
        primary_only: bool,
    },

    /// Summarize a generated catalog
    Summary {
        /// Output directory of a previous run
        #[arg(short, long, default_value = "output")]
        output: String,

        /// Also print the root-cause report
        #[arg(long)]
        report: bool,
    },

    /// Collect every record belonging to one incident
    Map {
        /// Incident id or unambiguous prefix
        incident_id: String,

        /// Output directory of a previous run
        #[arg(short, long, default_value = "output")]
        output: String,

        /// Write the full correlation as JSON to this path
        #[arg(long)]
        save: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Generate {
            config,
            output,
            days,
            seed,
            plain,
        } => commands::generate::run(config.as_deref(), &output, days, seed, plain),
        Commands::Init { path, force } => commands::init::run(&path, force),
        Commands::List {
            output,
            incident_type,
            primary_only,
        } => commands::list::run(&output, incident_type.as_deref(), primary_only),
        Commands::Summary { output, report } => commands::summary::run(&output, report),
        Commands::Map {
            incident_id,
            output,
            save,
        } => commands::map::run(&incident_id, &output, save.as_deref()),
    }
}
