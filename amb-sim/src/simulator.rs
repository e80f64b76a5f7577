//! Synthetic decoder state and the per-connection serving loop.
//!
//! Each connection receives STATUS records on a slow cadence and PASSING
//! records for a rotating set of transponders, and any read containing the
//! GET_TIME solicitation is answered with a clock report carrying the
//! simulated RTC.

use amb_decoder::{GetTimeRecord, PassingRecord, Record, StatusRecord, encode};
use amb_protocol::GET_TIME_REQUEST;
use rand::Rng;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub transponders: Vec<u32>,
    pub decoder_id: u32,
    pub passing_interval: Duration,
    pub status_interval: Duration,
}

/// Simulated decoder hardware: a passing counter and an RTC that started
/// at boot and advances with the host monotonic clock.
pub struct DecoderState {
    passing_number: u32,
    rtc_base_us: u64,
    started: Instant,
}

impl DecoderState {
    pub fn new() -> Self {
        let rtc_base_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_micros() as u64)
            .unwrap_or(0);

        Self {
            passing_number: 0,
            rtc_base_us,
            started: Instant::now(),
        }
    }

    pub fn next_passing_number(&mut self) -> u32 {
        self.passing_number += 1;
        self.passing_number
    }

    pub fn rtc_now_us(&self) -> u64 {
        self.rtc_base_us + self.started.elapsed().as_micros() as u64
    }
}

impl Default for DecoderState {
    fn default() -> Self {
        Self::new()
    }
}

fn build_passing(state: &mut DecoderState, config: &SimulatorConfig) -> Vec<u8> {
    let mut rng = rand::rng();
    let transponder = config.transponders[rng.random_range(0..config.transponders.len())];
    let strength = rng.random_range(60..1024) as u16;
    let hits = rng.random_range(1..=6) as u16;

    let record = Record::Passing(PassingRecord {
        passing_number: state.next_passing_number(),
        transponder,
        rtc_time: state.rtc_now_us(),
        strength,
        hits,
        flags: 0,
        utc_time: None,
        decoder_id: Some(config.decoder_id),
        undecoded: Vec::new(),
    });

    encode(&record)
}

fn build_status(state: &DecoderState, config: &SimulatorConfig) -> Vec<u8> {
    let mut rng = rand::rng();
    let record = Record::Status(StatusRecord {
        noise: rng.random_range(15..60) as u16,
        gps: 1,
        temperature: rng.random_range(150..350) as u16,
        loop_triggers: state.passing_number as u16,
        input_voltage: 120,
        decoder_id: Some(config.decoder_id),
        undecoded: Vec::new(),
    });

    encode(&record)
}

fn build_time_report(state: &DecoderState, config: &SimulatorConfig) -> Vec<u8> {
    let record = Record::GetTime(GetTimeRecord {
        rtc_time: state.rtc_now_us(),
        decoder_id: Some(config.decoder_id),
        undecoded: Vec::new(),
    });

    encode(&record)
}

/// Whether the accumulated inbound bytes contain the GET_TIME solicitation.
fn contains_time_request(buffer: &[u8]) -> bool {
    buffer
        .windows(GET_TIME_REQUEST.len())
        .any(|window| window == GET_TIME_REQUEST)
}

/// Serve one client until it disconnects.
pub async fn serve(stream: TcpStream, config: SimulatorConfig) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".into());
    info!(peer = %peer, "Client connected");

    let (mut reader, mut writer) = stream.into_split();
    let mut state = DecoderState::new();
    let mut passing_tick = interval(config.passing_interval);
    let mut status_tick = interval(config.status_interval);
    let mut inbound = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            _ = passing_tick.tick() => {
                let frame = build_passing(&mut state, &config);
                debug!(passing_number = state.passing_number, "Emitting passing");
                if let Err(error) = writer.write_all(&frame).await {
                    warn!(peer = %peer, error = %error, "Write failed, dropping client");
                    return;
                }
            }
            _ = status_tick.tick() => {
                let frame = build_status(&state, &config);
                if let Err(error) = writer.write_all(&frame).await {
                    warn!(peer = %peer, error = %error, "Write failed, dropping client");
                    return;
                }
            }
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        info!(peer = %peer, "Client disconnected");
                        return;
                    }
                    Ok(n) => {
                        inbound.extend_from_slice(&buf[..n]);
                        if contains_time_request(&inbound) {
                            inbound.clear();
                            debug!(peer = %peer, "Answering GET_TIME solicitation");
                            let frame = build_time_report(&state, &config);
                            if let Err(error) = writer.write_all(&frame).await {
                                warn!(peer = %peer, error = %error, "Write failed, dropping client");
                                return;
                            }
                        }
                        // Bound the scan buffer against clients that write
                        // arbitrary bytes
                        if inbound.len() > 4096 {
                            let keep = inbound.len() - GET_TIME_REQUEST.len();
                            inbound.drain(..keep);
                        }
                    }
                    Err(error) => {
                        warn!(peer = %peer, error = %error, "Read failed, dropping client");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amb_decoder::Decoder;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            transponders: vec![123, 456],
            decoder_id: 263676,
            passing_interval: Duration::from_millis(100),
            status_interval: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_emitted_passings_decode() {
        let mut state = DecoderState::new();
        let config = config();
        let decoder = Decoder::new();

        for expected in 1..=5u32 {
            let frame = build_passing(&mut state, &config);
            match decoder.decode(&frame).expect("simulator frame decodes") {
                Record::Passing(p) => {
                    assert_eq!(p.passing_number, expected);
                    assert!(config.transponders.contains(&p.transponder));
                    assert_eq!(p.decoder_id, Some(config.decoder_id));
                }
                other => panic!("expected PASSING, got {}", other.type_name()),
            }
        }
    }

    #[test]
    fn test_time_report_carries_advancing_rtc() {
        let state = DecoderState::new();
        let config = config();
        let decoder = Decoder::new();

        let first = match decoder
            .decode(&build_time_report(&state, &config))
            .expect("decodes")
        {
            Record::GetTime(t) => t.rtc_time,
            other => panic!("expected GET_TIME, got {}", other.type_name()),
        };
        std::thread::sleep(Duration::from_millis(2));
        let second = match decoder
            .decode(&build_time_report(&state, &config))
            .expect("decodes")
        {
            Record::GetTime(t) => t.rtc_time,
            other => panic!("expected GET_TIME, got {}", other.type_name()),
        };

        assert!(second > first);
    }

    #[test]
    fn test_solicitation_detection() {
        assert!(contains_time_request(&GET_TIME_REQUEST));

        let mut padded = vec![0xAA, 0xBB];
        padded.extend_from_slice(&GET_TIME_REQUEST);
        padded.push(0xCC);
        assert!(contains_time_request(&padded));

        assert!(!contains_time_request(&GET_TIME_REQUEST[..10]));
    }
}
