//! Decoder ingest daemon: connects to the lap decoder, persists passings,
//! and hosts the local time service for other processes.

use amb_ingest::db;
use amb_ingest::error::CoreError;
use amb_ingest::ingest::{IngestClient, IngestConfig};
use amb_ingest::shutdown::shutdown_channel;
use amb_ingest::time::{DEFAULT_PUBLISH_INTERVAL, DEFAULT_TIME_ADDR, DEFAULT_TIME_PORT};
use amb_ingest::time::{DecoderTime, TimeServer};
use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "amb-client")]
#[command(about = "AMB P3 ingest client - reads the lap decoder, stores passings, serves time")]
struct Args {
    /// Decoder IP or hostname
    #[arg(short = 'i', long)]
    ip: Option<String>,

    /// Decoder TCP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// JSON config file; command-line flags override its values
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Append raw frames (hex, one per line) to this file
    #[arg(short = 'l', long)]
    raw_log: Option<PathBuf>,

    /// Route diagnostic logging to this file instead of stderr
    #[arg(long)]
    debug_file: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    db_path: Option<String>,

    /// Accept frames whose CRC does not verify (firmwares emitting 0x0000)
    #[arg(long)]
    skip_crc_check: bool,

    /// Local port for the time service
    #[arg(long)]
    time_port: Option<u16>,

    /// Seconds between GET_TIME solicitations
    #[arg(long)]
    time_request_interval: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    ip: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
    raw_log: Option<PathBuf>,
    debug_file: Option<PathBuf>,
    skip_crc_check: Option<bool>,
    time_port: Option<u16>,
    time_request_interval: Option<u64>,
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
    info!("Starting amb-client");

    let Some(ip) = args.ip.or(file.ip) else {
        bail!("decoder ip is required (-i or config file)");
    };
    let port = args.port.or(file.port).unwrap_or(5403);
    let db_path = args
        .db_path
        .or(file.db_path)
        .unwrap_or_else(|| "amb-timing.db".into());
    let raw_log = args.raw_log.or(file.raw_log);
    let skip_crc_check = args.skip_crc_check || file.skip_crc_check.unwrap_or(false);
    let time_port = args.time_port.or(file.time_port).unwrap_or(DEFAULT_TIME_PORT);
    let time_request_interval = args
        .time_request_interval
        .or(file.time_request_interval)
        .unwrap_or(30);

    let pool = db::create_pool(&db_path).await?;
    db::run_migrations(&pool).await?;

    let clock = Arc::new(DecoderTime::unset());
    let (handle, shutdown) = shutdown_channel();

    let config = IngestConfig {
        decoder_host: ip,
        decoder_port: port,
        time_request_interval: Duration::from_secs(time_request_interval),
        check_crc: !skip_crc_check,
        ..IngestConfig::default()
    };

    let mut client = IngestClient::new(config, pool.clone(), clock.clone());
    if let Some(path) = raw_log {
        let file = std::fs::File::options()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening raw log {}", path.display()))?;
        client = client.with_raw_log(file);
    }

    // Decoder unreachable at startup is fatal; the wrapper decides retries
    let mut stream = client.connect().await.context("decoder unreachable")?;

    client
        .acquire_initial_clock(&mut stream)
        .await
        .context("no initial device clock")?;

    // Publish device time for the other processes
    let listener = TcpListener::bind((DEFAULT_TIME_ADDR, time_port))
        .await
        .context("binding time service port")?;
    let server = TimeServer::new(clock.clone(), DEFAULT_PUBLISH_INTERVAL);
    let server_task = tokio::spawn(server.run(listener, shutdown.clone()));

    let ctrlc_handle = handle;
    let mut run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            ctrlc_handle.trigger();
        }
    });

    loop {
        match client.run(stream, &mut run_shutdown).await {
            Ok(()) => break,
            Err(CoreError::PeerClosed) => {
                if run_shutdown.is_triggered() {
                    break;
                }
                warn!("Decoder closed the connection, reconnecting in 3 seconds");
                tokio::time::sleep(Duration::from_secs(3)).await;
                stream = client.connect().await.context("decoder unreachable")?;
            }
            Err(error) => return Err(error.into()),
        }
    }

    server_task.await.ok();
    info!("amb-client stopped");
    Ok(())
}
