//! TCP consumer of the time stream.
//!
//! Reads ASCII lines, parses the last whitespace-delimited token of each as
//! the device-time estimate, and assigns it into the shared [`DecoderTime`].
//! A garbled line resets the shared value to 0 and forces a reconnect.

use super::DecoderTime;
use crate::error::{CoreError, CoreResult};
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Bounded connect retries before giving up.
pub const CONNECT_RETRY_LIMIT: u32 = 30;

/// Delay between connect attempts.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Parse one published line: the last whitespace-delimited token is the
/// time; arbitrary leading tokens are tolerated.
pub fn parse_time_line(line: &str) -> Option<u64> {
    line.split_whitespace().last()?.parse().ok()
}

pub struct TimeClient {
    addr: String,
    clock: Arc<DecoderTime>,
}

impl TimeClient {
    pub fn new(addr: String, clock: Arc<DecoderTime>) -> Self {
        Self { addr, clock }
    }

    /// Run until shutdown: connect (bounded retries), consume lines,
    /// reconnect on stream end or parse failure.
    pub async fn run(self, mut shutdown: Shutdown) -> CoreResult<()> {
        loop {
            let Some(stream) = self.connect(&mut shutdown).await? else {
                return Ok(());
            };

            let mut lines = BufReader::new(stream).lines();
            loop {
                tokio::select! {
                    _ = shutdown.recv() => return Ok(()),
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => match parse_time_line(&line) {
                                Some(time) => self.clock.set(time),
                                None => {
                                    warn!(line = %line, "Unparseable time line, reconnecting");
                                    self.clock.reset();
                                    break;
                                }
                            },
                            Ok(None) => {
                                debug!("Time server closed the stream, reconnecting");
                                break;
                            }
                            Err(error) => {
                                warn!(error = %error, "Time stream read failed, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// `Ok(None)` means shutdown was requested while waiting.
    async fn connect(&self, shutdown: &mut Shutdown) -> CoreResult<Option<TcpStream>> {
        let mut last_error = None;

        for attempt in 1..=CONNECT_RETRY_LIMIT {
            tokio::select! {
                _ = shutdown.recv() => return Ok(None),
                _ = sleep(CONNECT_RETRY_INTERVAL) => {}
            }

            match TcpStream::connect(self.addr.as_str()).await {
                Ok(stream) => {
                    info!(addr = %self.addr, "Connected to time server");
                    return Ok(Some(stream));
                }
                Err(error) => {
                    debug!(
                        attempt,
                        limit = CONNECT_RETRY_LIMIT,
                        error = %error,
                        "Time server connect failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(CoreError::Transport(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no connect attempts made")
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line() {
        assert_eq!(parse_time_line("1592148824541000\n"), Some(1592148824541000));
        assert_eq!(parse_time_line("1592148824541000"), Some(1592148824541000));
    }

    #[test]
    fn test_parse_takes_last_token() {
        assert_eq!(parse_time_line("ts 42 1000"), Some(1000));
        assert_eq!(parse_time_line("  7  "), Some(7));
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_time_line(""), None);
        assert_eq!(parse_time_line("   "), None);
        assert_eq!(parse_time_line("not-a-number"), None);
        assert_eq!(parse_time_line("12 trailing-garbage"), None);
        assert_eq!(parse_time_line("-5"), None);
    }
}
