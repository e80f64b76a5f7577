//! The decoder TCP client.
//!
//! One connection, one read loop: bytes are framed by the splitter, every
//! frame goes through the codec, and records are dispatched - passings to
//! the `passes` table, clock reports into the shared [`DecoderTime`],
//! everything else to the debug log. A GET_TIME solicitation goes out on a
//! fixed cadence so device-clock drift stays bounded.

use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::shutdown::Shutdown;
use crate::time::DecoderTime;
use amb_decoder::{Decoder, FrameSplitter, Record};
use amb_protocol::GET_TIME_REQUEST;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub decoder_host: String,
    pub decoder_port: u16,

    /// Initial connect timeout
    pub connect_timeout: Duration,

    /// Per-read buffer size
    pub read_buffer_size: usize,

    /// Cadence of the GET_TIME solicitation
    pub time_request_interval: Duration,

    /// Disable CRC enforcement for firmwares that emit 0x0000
    pub check_crc: bool,

    /// Bounded attempts to obtain the initial device clock
    pub clock_attempts: u32,

    /// Delay per initial-clock attempt
    pub clock_retry_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            decoder_host: "localhost".into(),
            decoder_port: 5403,
            connect_timeout: Duration::from_secs(5),
            read_buffer_size: 10240,
            time_request_interval: Duration::from_secs(30),
            check_crc: true,
            clock_attempts: 30,
            clock_retry_interval: Duration::from_secs(1),
        }
    }
}

pub struct IngestClient {
    config: IngestConfig,
    pool: sqlx::SqlitePool,
    clock: Arc<DecoderTime>,
    decoder: Decoder,
    raw_log: Option<std::fs::File>,
}

impl IngestClient {
    pub fn new(config: IngestConfig, pool: sqlx::SqlitePool, clock: Arc<DecoderTime>) -> Self {
        let decoder = if config.check_crc {
            Decoder::new()
        } else {
            Decoder::with_crc_disabled()
        };

        Self {
            config,
            pool,
            clock,
            decoder,
            raw_log: None,
        }
    }

    /// Append each raw frame as a hex line to the given file.
    pub fn with_raw_log(mut self, file: std::fs::File) -> Self {
        self.raw_log = Some(file);
        self
    }

    /// Open the decoder connection, bounded by the connect timeout.
    pub async fn connect(&self) -> CoreResult<TcpStream> {
        let addr = (self.config.decoder_host.as_str(), self.config.decoder_port);
        info!(
            host = %self.config.decoder_host,
            port = self.config.decoder_port,
            "Connecting to decoder"
        );

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                CoreError::Transport(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "decoder connect timed out",
                ))
            })?
            .map_err(CoreError::Transport)?;

        info!("Connected to decoder");
        Ok(stream)
    }

    /// Solicit and wait for the first GET_TIME record, seeding the shared
    /// clock. Bounded retry; persistent failure is a fatal configuration
    /// error.
    pub async fn acquire_initial_clock(&mut self, stream: &mut TcpStream) -> CoreResult<u64> {
        let mut splitter = FrameSplitter::new();
        let mut buf = vec![0u8; self.config.read_buffer_size];

        for attempt in 1..=self.config.clock_attempts {
            info!(
                attempt,
                limit = self.config.clock_attempts,
                "Waiting for decoder timestamp"
            );

            stream
                .write_all(&GET_TIME_REQUEST)
                .await
                .map_err(CoreError::Transport)?;

            let read = timeout(self.config.clock_retry_interval, stream.read(&mut buf)).await;
            let n = match read {
                Err(_) => continue, // no data this attempt
                Ok(result) => result.map_err(CoreError::Transport)?,
            };
            if n == 0 {
                return Err(CoreError::PeerClosed);
            }

            for frame in splitter.feed(&buf[..n]) {
                match self.decoder.decode(&frame) {
                    Ok(Record::GetTime(report)) => {
                        self.clock.set(report.rtc_time);
                        info!(rtc = report.rtc_time, "Initial device clock acquired");
                        return Ok(report.rtc_time);
                    }
                    Ok(other) => {
                        debug!(record = other.type_name(), "Skipping record while waiting for clock");
                    }
                    Err(error) => {
                        warn!(error = %error, "Dropping malformed frame while waiting for clock");
                    }
                }
            }
        }

        Err(CoreError::Config(format!(
            "no GET_TIME record after {} attempts",
            self.config.clock_attempts
        )))
    }

    /// Steady-state loop: read, frame, decode, dispatch; solicit GET_TIME
    /// on the configured cadence. Returns `Ok(())` on shutdown and
    /// [`CoreError::PeerClosed`] when the decoder hangs up.
    pub async fn run(&mut self, stream: TcpStream, shutdown: &mut Shutdown) -> CoreResult<()> {
        let (mut reader, mut writer) = stream.into_split();
        let mut splitter = FrameSplitter::new();
        let mut buf = vec![0u8; self.config.read_buffer_size];

        let mut solicit = interval(self.config.time_request_interval);
        solicit.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = solicit.tick() => {
                    debug!("Requesting decoder time");
                    writer
                        .write_all(&GET_TIME_REQUEST)
                        .await
                        .map_err(CoreError::Transport)?;
                }
                read = reader.read(&mut buf) => {
                    let n = read.map_err(CoreError::Transport)?;
                    if n == 0 {
                        return Err(CoreError::PeerClosed);
                    }
                    for frame in splitter.feed(&buf[..n]) {
                        self.handle_frame(&frame).await?;
                    }
                }
            }
        }
    }

    async fn handle_frame(&mut self, raw: &[u8]) -> CoreResult<()> {
        self.log_raw(raw);

        match self.decoder.decode(raw) {
            Ok(Record::Passing(passing)) => {
                if let Some(entry_id) =
                    db::passes::insert_with_retry(&self.pool, &passing).await?
                {
                    info!(
                        entry_id,
                        pass_id = passing.passing_number,
                        transponder = passing.transponder,
                        rtc = passing.rtc_time,
                        "Passing stored"
                    );
                }
            }
            Ok(Record::GetTime(report)) => {
                debug!(rtc = report.rtc_time, "Device clock correction");
                self.clock.set(report.rtc_time);
            }
            Ok(other) => {
                debug!(
                    record = %serde_json::Value::Object(other.to_field_map()),
                    "Non-persisted record"
                );
            }
            // Malformed frames are dropped here and never propagate
            Err(error) => {
                warn!(
                    error = %error,
                    frame = %hex::encode(raw),
                    "Dropping malformed frame"
                );
            }
        }

        Ok(())
    }

    fn log_raw(&mut self, raw: &[u8]) {
        if let Some(file) = self.raw_log.as_mut()
            && let Err(error) = writeln!(file, "{}", hex::encode(raw))
        {
            warn!(error = %error, "Raw log write failed");
        }
    }
}
