//! guild-migrate CLI - Copy a Discord server's structure to Stoat or Matrix.

use clap::{Parser, Subcommand};
use guild_migrate::{
    AdapterCatalog, Config, DiscordReader, MigrateError, Orchestrator, ServerSnapshot,
    SnapshotReader,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "guild-migrate")]
#[command(about = "Copy a Discord server's structure to Stoat or Matrix")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the server structure to a destination platform
    Run {
        /// Destination platform (see `platforms`)
        #[arg(short, long)]
        target: String,

        /// Replay a saved snapshot instead of reading Discord
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Dry run: show what would be created without calling the destination
        #[arg(long)]
        dry_run: bool,

        /// Override migration.max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Read the source server and save it as a JSON snapshot
    Snapshot {
        /// Output path for the snapshot file
        #[arg(short, long, default_value = "snapshot.json")]
        output: PathBuf,
    },

    /// List the available destination platforms
    Platforms,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();
    let catalog = AdapterCatalog::with_builtins();

    // Platforms needs neither logging nor a config file
    if let Commands::Platforms = cli.command {
        let platforms = catalog.platforms();
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&platforms)?);
        } else {
            for platform in platforms {
                println!("{}", platform);
            }
        }
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Platforms => unreachable!(), // Handled above
        Commands::Run {
            target,
            snapshot,
            dry_run,
            max_attempts,
        } => {
            if let Some(n) = max_attempts {
                config.migration.max_attempts = n;
                config.validate()?;
            }

            // Fail on a bad target before spending any source requests
            let adapter = catalog.create(&target, &config)?;
            let snapshot = read_snapshot(&config, snapshot.as_deref()).await?;
            let orchestrator =
                Orchestrator::new(adapter).with_retry_policy(config.retry_policy());

            if dry_run {
                let plan = orchestrator.plan(&snapshot);
                if cli.output_json {
                    println!("{}", plan.to_json()?);
                } else {
                    println!("\nDry run: nothing was created.\n");
                    print!("{}", plan.render_text());
                }
                return Ok(());
            }

            let report = orchestrator.run(snapshot).await;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!();
                print!("{}", report.render_text());
            }

            if let Some(err) = report.abort_error() {
                return Err(err);
            }
        }

        Commands::Snapshot { output } => {
            let snapshot = DiscordReader::from_config(&config)?.read_snapshot().await?;
            snapshot.save(&output)?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("Snapshot written to {}", output.display());
                println!("  {}", snapshot.summary());
                let warnings = snapshot.validate();
                for warning in &warnings {
                    println!("  Warning: {}", warning);
                }
            }
        }
    }

    Ok(())
}

async fn read_snapshot(config: &Config, path: Option<&Path>) -> Result<ServerSnapshot, MigrateError> {
    match path {
        Some(path) => {
            let snapshot = ServerSnapshot::load(path)?;
            info!("Loaded snapshot from {:?}: {}", path, snapshot.summary());
            Ok(snapshot)
        }
        None => DiscordReader::from_config(config)?.read_snapshot().await,
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
