//! Command-line entry point for the arena ELO leaderboard
//!
//! One-shot subcommands act as the manual-entry and settings surface;
//! `serve` keeps the leaderboard running with local HTTP endpoints and,
//! optionally, an observer fed with page events on stdin.

use anyhow::Result;
use arena_elo::command::messages::MatchPayload;
use arena_elo::command::{Command, CommandClient, CommandResponse};
use arena_elo::config::{validate_config, AppConfig, StorageBackend};
use arena_elo::error::LeaderboardError;
use arena_elo::leaderboard::Standing;
use arena_elo::observer::PageEvent;
use arena_elo::service::{AppState, HealthCheck, HealthStatus};
use arena_elo::store::{export_file_name, to_pretty_json};
use arena_elo::types::{Outcome, Snapshot};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

/// Arena ELO - local leaderboard for head-to-head model votes
#[derive(Parser)]
#[command(
    name = "arena-elo",
    version,
    about = "Keep an ELO leaderboard of head-to-head AI model comparisons",
    long_about = "Arena ELO records match outcomes between AI models, either observed on a \
                 comparison arena or entered by hand, and maintains an ELO leaderboard with \
                 rename, reset, import and export support."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Data file override
    #[arg(long, value_name = "PATH", help = "Store the leaderboard in this file")]
    data_file: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Record a match result entered by hand
    Record {
        model_a: String,
        model_b: String,
        /// Winner: a, b or draw
        winner: String,
    },
    /// Rename a model everywhere it appears
    Rename { old_name: String, new_name: String },
    /// Delete all ratings and match history
    Reset {
        #[arg(long, help = "Confirm that all data should be deleted")]
        yes: bool,
    },
    /// Write a backup of all data
    Export {
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace all data with a backup file
    Import {
        path: PathBuf,
        #[arg(long, help = "Confirm that current data should be overwritten")]
        yes: bool,
    },
    /// Show the ranked leaderboard
    Leaderboard,
    /// Show recorded matches, oldest first
    History {
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Check storage health and exit with a status code
    Health,
    /// Run the leaderboard with HTTP endpoints until interrupted
    Serve {
        #[arg(long, help = "Read JSON page events from stdin and record observed votes")]
        observe_stdin: bool,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => AppConfig::from_file(config_path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(data_file) = &args.data_file {
        config.storage.backend = StorageBackend::File;
        config.storage.path = data_file.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

/// Print a command response and turn errors into a failing exit
fn report(response: CommandResponse) -> Result<()> {
    if response.is_success() {
        println!("{}", response.message);
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "[{}] {}",
            response.error_kind().unwrap_or("internal"),
            response.message
        ))
    }
}

fn print_standings(standings: &[Standing]) {
    if standings.is_empty() {
        println!("No matches recorded yet.");
        return;
    }

    let width = standings
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(5)
        .max(5);
    println!("{:>4}  {:<width$}  {:>6}  {:>5}  {:>5}", "Rank", "Model", "Score", "Votes", "±", width = width);
    for standing in standings {
        let interval = standing
            .confidence_interval
            .map(|ci| format!("±{}", ci))
            .unwrap_or_default();
        println!(
            "{:>4}  {:<width$}  {:>6}  {:>5}  {:>5}",
            standing.rank,
            standing.name,
            standing.score,
            standing.votes,
            interval,
            width = width
        );
    }
}

async fn export(client: &CommandClient, output: Option<PathBuf>) -> Result<()> {
    let response = client.export().await;
    if !response.is_success() {
        return report(response);
    }

    let data = response
        .data
        .ok_or_else(|| anyhow::anyhow!("Export returned no data"))?;
    let snapshot: Snapshot = serde_json::from_value(data)?;
    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(chrono::Utc::now())));

    tokio::fs::write(&path, to_pretty_json(&snapshot)?).await?;
    println!(
        "Exported {} models and {} matches to {}",
        snapshot.elo_data.len(),
        snapshot.match_history.len(),
        path.display()
    );
    Ok(())
}

async fn import(client: &CommandClient, path: PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(&path).await?;
    let document = match serde_json::from_str(&text) {
        Ok(document) => document,
        Err(e) => {
            return report(CommandResponse::error(&LeaderboardError::InvalidFormat {
                reason: format!("file is not valid JSON: {}", e),
            }))
        }
    };
    report(client.import(document).await)
}

async fn health(app: &AppState) -> Result<()> {
    let health = HealthCheck::check(&app.store(), &app.config().service.name).await;
    println!("Health Check: {}", health.status);
    println!("  Models: {}", health.stats.competitors);
    println!("  Matches: {}", health.stats.matches);
    if let Some(leader) = &health.stats.leader {
        println!("  Leader: {}", leader);
    }
    for check in health.checks.iter().filter(|c| c.message.is_some()) {
        println!("  {}: {}", check.name, check.message.as_deref().unwrap_or_default());
    }

    match health.status {
        HealthStatus::Healthy => Ok(()),
        status => Err(anyhow::anyhow!("Leaderboard is {:?}", status)),
    }
}

/// Feed page events from stdin into an observer until stdin closes
async fn observe_stdin(app: &AppState) {
    let mut observer = app.observer();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(Duration::from_secs(1));

    info!("Observing page events on stdin");
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<PageEvent>(&line) {
                    Ok(event) => {
                        if let Some(response) = observer.handle_event(event, Instant::now()).await {
                            info!("Observed match submitted: {}", response.message);
                        }
                    }
                    Err(e) => warn!("Ignoring malformed page event: {}", e),
                },
                Ok(None) => {
                    info!("stdin closed, observer stopped");
                    return;
                }
                Err(e) => {
                    error!("Failed to read page events: {}", e);
                    return;
                }
            },
            _ = ticker.tick() => observer.tick(Instant::now()),
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

async fn serve(mut app: AppState, observe: bool) -> Result<()> {
    info!("🚀 Arena ELO leaderboard");
    info!("   Service: {}", app.config().service.name);
    info!("   Storage: {:?} {}", app.config().storage.backend, app.config().storage.path.display());
    info!("   K-factor: {}", app.config().rating.k_factor);
    info!("   Port: {}", app.config().service.metrics_port);

    app.start().await?;

    if observe {
        tokio::select! {
            _ = observe_stdin(&app) => {}
            _ = wait_for_shutdown_signal() => {}
        }
    } else {
        wait_for_shutdown_signal().await;
    }

    info!("🛑 Shutdown signal received");
    app.shutdown().await;
    Ok(())
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let app = AppState::new(config).await?;
    let client = app.client();

    match args.command {
        CliCommand::Record {
            model_a,
            model_b,
            winner,
        } => {
            // Typed input is lenient: a, B, draw and tie are all accepted
            let outcome = match winner.parse::<Outcome>() {
                Ok(outcome) => outcome,
                Err(reason) => {
                    return report(CommandResponse::error(&LeaderboardError::InvalidInput {
                        reason,
                    }))
                }
            };
            let command = Command::ManualMatch(MatchPayload {
                model_a: model_a.trim().to_string(),
                model_b: model_b.trim().to_string(),
                winner: outcome.to_string(),
            });
            report(client.send(command).await)
        }
        CliCommand::Rename { old_name, new_name } => {
            report(client.rename(old_name.trim(), new_name.trim()).await)
        }
        CliCommand::Reset { yes } => {
            if !yes {
                return Err(anyhow::anyhow!(
                    "Refusing to delete all data without --yes"
                ));
            }
            report(client.reset().await)
        }
        CliCommand::Export { output } => export(&client, output).await,
        CliCommand::Import { path, yes } => {
            if !yes {
                return Err(anyhow::anyhow!(
                    "Import overwrites all current data; pass --yes to continue"
                ));
            }
            import(&client, path).await
        }
        CliCommand::Leaderboard => {
            print_standings(&app.store().standings().await?);
            Ok(())
        }
        CliCommand::History { limit } => {
            let history = app.store().history().await?;
            let skip = limit.map(|n| history.len().saturating_sub(n)).unwrap_or(0);
            for record in history.iter().skip(skip) {
                println!(
                    "{}  {} ({} -> {}) vs {} ({} -> {})  winner: {}",
                    record.timestamp,
                    record.model_a,
                    record.old_rating_a,
                    record.new_rating_a,
                    record.model_b,
                    record.old_rating_b,
                    record.new_rating_b,
                    record.winner
                );
            }
            Ok(())
        }
        CliCommand::Health => health(&app).await,
        CliCommand::Serve { observe_stdin } => serve(app, observe_stdin).await,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(2);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(args, config).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
