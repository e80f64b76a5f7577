//! Cooperative shutdown.
//!
//! Every long-running task holds a [`Shutdown`] receiver and observes it at
//! its suspension points; binaries trigger the [`ShutdownHandle`] on ctrl-c
//! and join the tasks afterwards.

use tokio::sync::watch;

pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Resolves once shutdown is requested. A dropped handle counts as a
    /// shutdown request so orphaned tasks still exit.
    pub async fn recv(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_wakes_receiver() {
        let (handle, mut shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());

        handle.trigger();
        shutdown.recv().await;
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_shutdown() {
        let (handle, mut shutdown) = shutdown_channel();
        drop(handle);
        shutdown.recv().await;
    }
}
