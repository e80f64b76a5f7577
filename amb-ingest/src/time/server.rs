//! TCP publisher of the device-time estimate.
//!
//! Each accepted connection gets its own task writing one ASCII decimal
//! line per interval. A broken pipe ends that handler only; the accept
//! loop runs until shutdown.

use super::DecoderTime;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub struct TimeServer {
    clock: Arc<DecoderTime>,
    interval: Duration,
}

impl TimeServer {
    pub fn new(clock: Arc<DecoderTime>, interval: Duration) -> Self {
        Self { clock, interval }
    }

    /// Serve until shutdown. The listener is bound by the caller so tests
    /// can use an ephemeral port.
    pub async fn run(self, listener: TcpListener, mut shutdown: Shutdown) {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Time server listening");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Time server shutting down");
                    return;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "Time client connected");
                            let clock = Arc::clone(&self.clock);
                            let interval = self.interval;
                            let handler_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                publish(stream, clock, interval, handler_shutdown).await;
                            });
                        }
                        Err(error) => {
                            warn!(error = %error, "Time server accept failed");
                        }
                    }
                }
            }
        }
    }
}

async fn publish(
    mut stream: TcpStream,
    clock: Arc<DecoderTime>,
    interval: Duration,
    mut shutdown: Shutdown,
) {
    loop {
        let line = format!("{}\n", clock.now_us());

        tokio::select! {
            _ = shutdown.recv() => return,
            written = stream.write_all(line.as_bytes()) => {
                if let Err(error) = written {
                    debug!(error = %error, "Time client disconnected");
                    return;
                }
            }
        }

        tokio::select! {
            _ = shutdown.recv() => return,
            _ = sleep(interval) => {}
        }
    }
}
