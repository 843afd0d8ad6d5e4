//! Starting the orchestrator.
//!
//! # Responsibilities
//! - Flip the started flag and kick off the first full recomputation
//! - Decide whether a navigation warrants a recomputation
//! - Warn when `start` is forgotten
//!
//! # Design Decisions
//! - Before `start`, passes carry `started = false`; the scheduler may load
//!   applications but must not bootstrap or mount them
//! - Calling `start` twice is harmless; only the first call posts a pass
//! - url-reroute-only can be switched on by any call but never back off
//! - The watchdog is a plain task so hosts can run it or not

use std::time::Duration;

use tokio::sync::broadcast;

use crate::apps::errors::START_NOT_CALLED_CODE;
use crate::lifecycle::reroute::RerouteReason;
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;
use crate::routing::Location;

/// Options for [`Orchestrator::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Skip recomputation for history-API navigations that leave the route
    /// unchanged.
    pub url_reroute_only: bool,
}

/// What triggered a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    /// `pushState` / `replaceState` style updates.
    HistoryApi,
    /// Back/forward navigation.
    PopState,
    /// Fragment change.
    HashChange,
}

impl Orchestrator {
    /// Mark the orchestrator started and schedule a recomputation.
    pub fn start(&self, options: StartOptions) {
        let first = self.with_state(|state| {
            let first = !state.started;
            state.started = true;
            if options.url_reroute_only {
                state.url_reroute_only = true;
            }
            first
        });

        if !first {
            tracing::debug!(url_reroute_only = options.url_reroute_only, "start called again");
            return;
        }

        tracing::info!(url_reroute_only = options.url_reroute_only, "Orchestrator started");
        self.post_reroute(RerouteReason::Started);
    }

    pub fn is_started(&self) -> bool {
        self.with_state(|state| state.started)
    }

    pub fn url_reroute_only(&self) -> bool {
        self.with_state(|state| state.url_reroute_only)
    }

    /// Whether a navigation from `previous` to `next` should recompute.
    ///
    /// With url-reroute-only enabled, history-API updates that keep the same
    /// route are ignored. Pop-state and hash-change always recompute.
    pub fn should_reroute(&self, previous: &Location, next: &Location, source: NavigationSource) -> bool {
        if source != NavigationSource::HistoryApi || !self.url_reroute_only() {
            return true;
        }
        previous.route() != next.route()
    }

    /// Report a navigation. Posts a recomputation pass when warranted and
    /// returns whether it did.
    pub fn navigate(&self, previous: &Location, next: &Location, source: NavigationSource) -> bool {
        let reroute = self.should_reroute(previous, next, source);
        tracing::debug!(
            from = %previous,
            to = %next,
            ?source,
            reroute,
            "Navigation"
        );
        if reroute {
            self.post_reroute(RerouteReason::Navigation);
        }
        reroute
    }
}

/// Warns once if `start` has not been called within the grace period.
pub struct StartWatchdog {
    orchestrator: Orchestrator,
    delay: Duration,
}

impl StartWatchdog {
    pub fn new(orchestrator: Orchestrator, delay: Duration) -> Self {
        Self { orchestrator, delay }
    }

    /// Returns true when the warning was emitted.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = shutdown.recv() => {
                tracing::debug!("Start watchdog cancelled");
                return false;
            }
        }

        if self.orchestrator.is_started() {
            return false;
        }

        tracing::warn!(
            code = START_NOT_CALLED_CODE,
            waited_ms = self.delay.as_millis() as u64,
            "start() has not been called; applications will be loaded but never mounted"
        );
        metrics::record_start_not_called();
        true
    }
}
