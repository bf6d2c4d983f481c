//! Main entry point for the duo-match client
//!
//! Runs a local matchmaking simulation: an in-process realtime service and one
//! matchmaking controller per simulated client. Optionally keeps the first
//! client's session reachable over HTTP until shutdown.

use anyhow::Result;
use clap::Parser;
use duo_match::config::AppConfig;
use duo_match::service::{
    ControlServer, ControlServerConfig, ControlServerState, SimulationApp, SimulationReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// duo-match - pair two clients into a realtime room
#[derive(Parser)]
#[command(
    name = "duo-match",
    version,
    about = "Client-side matchmaking orchestrator for two-player realtime rooms",
    long_about = "duo-match connects clients to a realtime backend, joins a random open room \
                 or creates one when none exists, and loads the room scene once the room \
                 is full. This binary runs the matchmaking against an in-process backend."
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

    /// Number of simulated clients
    #[arg(long, value_name = "N", help = "Number of clients to matchmake")]
    clients: Option<usize>,

    /// Game version override
    #[arg(long, value_name = "VERSION", help = "Override the client game version")]
    game_version: Option<String>,

    /// Room capacity override
    #[arg(long, value_name = "N", help = "Override the maximum players per room")]
    max_players: Option<u8>,

    /// Let joins land in full rooms
    #[arg(
        long,
        help = "Do not enforce room capacity in the local backend (exercises overflow handling)"
    )]
    no_capacity_enforcement: bool,

    /// Serve the first client's session over HTTP
    #[arg(long, help = "Keep running and expose the first client over HTTP")]
    serve: bool,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP control server port")]
    http_port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without matchmaking")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(clients) = args.clients {
        config.simulation.clients = clients;
    }
    if let Some(game_version) = &args.game_version {
        config.matchmaking.game_version = game_version.clone();
    }
    if let Some(max_players) = args.max_players {
        config.matchmaking.max_players_per_room = max_players;
    }
    if args.no_capacity_enforcement {
        config.simulation.enforce_capacity = false;
    }
    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    duo_match::config::validate_config(&config)?;
    Ok(config)
}

/// Display startup banner with client information
fn display_startup_banner(config: &AppConfig) {
    info!("duo-match {}", duo_match::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Game version: {}", config.matchmaking.game_version);
    info!(
        "   Players per room: {}",
        config.matchmaking.max_players_per_room
    );
    info!("   Room scene: {}", config.matchmaking.room_scene_name);
    info!("   Simulated clients: {}", config.simulation.clients);
    info!(
        "   Capacity enforced: {}",
        config.simulation.enforce_capacity
    );
}

fn print_report(report: &SimulationReport) {
    for session in &report.sessions {
        let room = session
            .room
            .as_ref()
            .map(|room| format!("{} ({}/{})", room.room_id, room.player_count, room.max_players))
            .unwrap_or_else(|| "-".to_string());
        println!("session {}  {:<18}  room {}", session.id, session.state.to_string(), room);
    }
    println!(
        "rooms created: {}, random joins: {}, random join failures: {}",
        report.stats.rooms_created, report.stats.random_joins, report.stats.random_join_failures
    );
    if report.timed_out {
        println!("not every client settled before the ready timeout");
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

async fn serve_first_client(app: &SimulationApp) -> Result<()> {
    let Some(slot) = app.clients().first() else {
        warn!("No client to serve");
        return Ok(());
    };

    let server = Arc::new(ControlServer::new(
        ControlServerConfig {
            host: app.config().service.http_host.clone(),
            port: app.config().service.http_port,
        },
        ControlServerState {
            handle: slot.handle().clone(),
            snapshots: slot.snapshots(),
            status: slot.status().clone(),
            metrics_collector: app.metrics(),
        },
    ));

    let server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };

    info!("Serving {} - press Ctrl+C to stop", slot.label());
    wait_for_shutdown_signal().await;
    server.stop();

    match server_task.await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("Control server task failed: {}", e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful - exiting");
        return Ok(());
    }

    let app = match SimulationApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize simulation: {}", e);
            std::process::exit(1);
        }
    };

    app.connect_staggered(Duration::from_secs(2)).await?;
    let report = app.wait_until_settled().await;
    print_report(&report);

    if args.serve {
        serve_first_client(&app).await?;
    }

    let timed_out = report.timed_out;
    app.shutdown();

    if timed_out {
        std::process::exit(2);
    }
    Ok(())
}
