//! Shutdown coordination for background loops.

use tokio::sync::broadcast;

/// Broadcasts a single stop signal to the reroute loop, the start watchdog
/// and any host task that subscribes.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let stopped = self.tx.send(()).unwrap_or(0);
        tracing::debug!(receivers = stopped, "Shutdown triggered");
    }

    /// Number of loops still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
