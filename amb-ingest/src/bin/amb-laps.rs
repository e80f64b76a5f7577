//! Heat/lap daemon: follows the time service and materializes heats and
//! laps from the passings table.

use amb_ingest::db;
use amb_ingest::heat::HeatEngine;
use amb_ingest::shutdown::shutdown_channel;
use amb_ingest::time::{DEFAULT_TIME_ADDR, DEFAULT_TIME_PORT, DecoderTime, TimeClient};
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "amb-laps")]
#[command(about = "AMB P3 heat engine - partitions passings into heats and laps")]
struct Args {
    /// JSON config file; command-line flags override its values
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Route diagnostic logging to this file instead of stderr
    #[arg(long)]
    debug_file: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    db_path: Option<String>,

    /// Time service host
    #[arg(long)]
    time_host: Option<String>,

    /// Time service port
    #[arg(long)]
    time_port: Option<u16>,

    /// Steady-state poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    db_path: Option<String>,
    debug_file: Option<PathBuf>,
    time_host: Option<String>,
    time_port: Option<u16>,
    poll_interval_ms: Option<u64>,
}

fn load_file_config(path: Option<&PathBuf>) -> anyhow::Result<FileConfig> {
    match path {
        None => Ok(FileConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))
        }
    }
}

fn init_tracing(debug_file: Option<&PathBuf>) -> anyhow::Result<()> {
    match debug_file {
        None => tracing_subscriber::fmt().init(),
        Some(path) => {
            let file = std::fs::File::options()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("opening debug log {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let file = load_file_config(args.config.as_ref())?;

    init_tracing(args.debug_file.as_ref().or(file.debug_file.as_ref()))?;
    info!("Starting amb-laps");

    let db_path = args
        .db_path
        .or(file.db_path)
        .unwrap_or_else(|| "amb-timing.db".into());
    let time_host = args
        .time_host
        .or(file.time_host)
        .unwrap_or_else(|| DEFAULT_TIME_ADDR.into());
    let time_port = args.time_port.or(file.time_port).unwrap_or(DEFAULT_TIME_PORT);
    let poll_interval = Duration::from_millis(
        args.poll_interval_ms.or(file.poll_interval_ms).unwrap_or(500),
    );

    let pool = db::create_pool(&db_path).await?;
    db::run_migrations(&pool).await?;

    let clock = Arc::new(DecoderTime::unset());
    let (handle, shutdown) = shutdown_channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            handle.trigger();
        }
    });

    // Follow the time service published by amb-client
    let time_client = TimeClient::new(format!("{}:{}", time_host, time_port), clock.clone());
    let time_task = tokio::spawn(time_client.run(shutdown.clone()));

    let engine = HeatEngine::new(pool, clock).with_poll_interval(poll_interval);
    engine.run(shutdown).await?;

    time_task.await.ok();
    info!("amb-laps stopped");
    Ok(())
}
