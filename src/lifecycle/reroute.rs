//! Recomputation queue.
//!
//! # Responsibilities
//! - Accept "please recompute" requests from any operation
//! - Run them after the current turn, one pass at a time
//! - Fold requests that pile up during a pass into the next one
//!
//! # Design Decisions
//! - Requests go through an unbounded channel; posting never blocks
//! - The loop yields once before each pass so continuations woken by the
//!   poster (for example an unload caller) run first
//! - Passes are awaited in sequence, so two passes never interleave

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::orchestrator::Orchestrator;

/// Why a recomputation was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "app", rename_all = "snake_case")]
pub enum RerouteReason {
    Registered(String),
    Started,
    Navigation,
    Unloaded(String),
    Manual,
}

impl RerouteReason {
    pub fn label(&self) -> &'static str {
        match self {
            RerouteReason::Registered(_) => "registered",
            RerouteReason::Started => "started",
            RerouteReason::Navigation => "navigation",
            RerouteReason::Unloaded(_) => "unloaded",
            RerouteReason::Manual => "manual",
        }
    }
}

/// One recomputation handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputePass {
    /// Monotonic pass number, starting at 1.
    pub sequence: u64,
    /// Requests folded into this pass, oldest first.
    pub reasons: Vec<RerouteReason>,
    /// Whether `start` has run. When false the driver may load but must not
    /// bootstrap or mount.
    pub started: bool,
}

/// Posting side of the queue.
#[derive(Debug, Clone)]
pub struct RerouteQueue {
    tx: mpsc::UnboundedSender<RerouteReason>,
}

impl RerouteQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RerouteReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedule a recomputation after the current turn.
    pub fn post(&self, reason: RerouteReason) {
        tracing::trace!(reason = reason.label(), "Recomputation requested");
        if self.tx.send(reason).is_err() {
            tracing::debug!("Reroute loop has stopped, dropping request");
        }
    }
}

/// Drains the queue and drives the scheduler.
pub struct RerouteLoop {
    orchestrator: Orchestrator,
    rx: mpsc::UnboundedReceiver<RerouteReason>,
    sequence: u64,
}

impl RerouteLoop {
    pub(crate) fn new(orchestrator: Orchestrator, rx: mpsc::UnboundedReceiver<RerouteReason>) -> Self {
        Self {
            orchestrator,
            rx,
            sequence: 0,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Reroute loop starting");

        loop {
            tokio::select! {
                received = self.rx.recv() => {
                    let Some(first) = received else {
                        tracing::info!("Reroute queue closed, exiting loop");
                        break;
                    };
                    self.run_pass(first).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reroute loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn run_pass(&mut self, first: RerouteReason) {
        // Let already-woken continuations observe settled state first.
        tokio::task::yield_now().await;

        let mut reasons = vec![first];
        while let Ok(reason) = self.rx.try_recv() {
            reasons.push(reason);
        }

        self.sequence += 1;
        let pass = RecomputePass {
            sequence: self.sequence,
            reasons,
            started: self.orchestrator.is_started(),
        };

        tracing::debug!(
            sequence = pass.sequence,
            folded = pass.reasons.len(),
            started = pass.started,
            "Running recomputation pass"
        );
        metrics::record_reroute_pass(pass.reasons.len());

        self.orchestrator.driver().reroute(pass.clone()).await;
        self.orchestrator.publish_pass(pass);
    }
}
