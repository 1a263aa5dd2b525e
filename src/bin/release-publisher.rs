//! Release Publisher CLI
//!
//! Publishes a built artifact's version metadata and uploads the artifact to
//! the package index. Every classified failure exits with its own code.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use release_publisher::release::{exit_code, extract_coordinates, failure_summary};
use release_publisher::{ReleaseConfig, ReleasePipeline, ReleaseSteps, SafeCommandExecutor};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Publish a release artifact to the metadata service and the package index
#[derive(Parser)]
#[command(name = "release-publisher")]
#[command(version)]
#[command(about = "Publish a release artifact to the metadata service and the package index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding the built artifact
    #[arg(long, global = true, default_value = "dist")]
    dist_dir: PathBuf,

    /// Timeout for the metadata request, in seconds
    #[arg(long, global = true, default_value_t = 5)]
    timeout_secs: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Publish metadata, then upload the artifact (default)
    Release,

    /// Publish version metadata only
    Metadata,

    /// Upload the artifact only
    Upload,

    /// Print the coordinates parsed from the artifact, without publishing
    Inspect,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = ReleaseConfig::from_env()
        .with_dist_dir(&cli.dist_dir)
        .with_metadata_timeout(Duration::from_secs(cli.timeout_secs));

    let steps = match cli.command.unwrap_or(Commands::Release) {
        Commands::Release => ReleaseSteps::All,
        Commands::Metadata => ReleaseSteps::MetadataOnly,
        Commands::Upload => ReleaseSteps::UploadOnly,
        Commands::Inspect => return inspect_command(&config),
    };

    release_command(&config, steps).await
}

async fn release_command(config: &ReleaseConfig, steps: ReleaseSteps) -> Result<i32> {
    let executor = SafeCommandExecutor::new(std::env::current_dir()?)?;
    let mut pipeline = ReleasePipeline::new(config, &executor);

    let result = pipeline.run(steps).await;
    if let Err(e) = &result {
        eprint!("{}", failure_summary(e));
    }
    Ok(exit_code(&result))
}

fn inspect_command(config: &ReleaseConfig) -> Result<i32> {
    match extract_coordinates(&config.dist_dir) {
        Ok(coordinates) => {
            println!("{}", serde_json::to_string_pretty(&coordinates)?);
            Ok(0)
        }
        Err(e) => {
            eprint!("{}", failure_summary(&e));
            Ok(e.exit_code())
        }
    }
}
