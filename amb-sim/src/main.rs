//! Synthetic AMB P3 decoder.
//!
//! Serves PASSING and STATUS frames to every client and answers GET_TIME
//! solicitations, so the full ingestion pipeline can run without hardware.

mod simulator;

use anyhow::Context;
use clap::Parser;
use simulator::SimulatorConfig;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "amb-sim")]
#[command(about = "Synthetic AMB P3 decoder for testing the ingestion pipeline")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// TCP port to serve on
    #[arg(short = 'p', long, default_value_t = 5403)]
    port: u16,

    /// Comma-separated transponder ids to rotate through
    #[arg(long, default_value = "7404583,7404584,7404585")]
    transponders: String,

    /// Milliseconds between emitted passings
    #[arg(long, default_value_t = 2000)]
    passing_interval_ms: u64,

    /// Seconds between emitted status records
    #[arg(long, default_value_t = 5)]
    status_interval_secs: u64,

    /// Decoder id reported in every record
    #[arg(long, default_value_t = 263676)]
    decoder_id: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let transponders: Vec<u32> = args
        .transponders
        .split(',')
        .map(|id| id.trim().parse().context("invalid transponder id"))
        .collect::<anyhow::Result<_>>()?;
    anyhow::ensure!(!transponders.is_empty(), "at least one transponder id required");

    let config = SimulatorConfig {
        transponders,
        decoder_id: args.decoder_id,
        passing_interval: Duration::from_millis(args.passing_interval_ms),
        status_interval: Duration::from_secs(args.status_interval_secs),
    };

    let listener = TcpListener::bind((args.bind.as_str(), args.port))
        .await
        .context("binding listen port")?;
    info!(bind = %args.bind, port = args.port, "Simulated decoder listening");

    loop {
        let (stream, _) = listener.accept().await.context("accept failed")?;
        let config = config.clone();
        tokio::spawn(async move {
            simulator::serve(stream, config).await;
        });
    }
}
