//! Unload coordination.
//!
//! # Responsibilities
//! - Keep at most one waiter record per application
//! - Hand every caller of the same unload the same settlement
//! - Run the immediate unmount → unload chain, once per record
//! - Settle callers before the follow-up recomputation pass runs
//!
//! # Waiter States
//! ```text
//! (none) --wait-->      Waiting   (teardown left to the change set)
//! (none) --immediate--> Tearing   (teardown running now)
//! Waiting --immediate--> Tearing
//! Waiting | Tearing --settled--> (none)
//! ```
//!
//! # Design Decisions
//! - A record already `Tearing` absorbs further requests; no second teardown
//! - Teardown waits out any in-flight lifecycle step before starting
//! - A failed unmount or unload leaves the application `SkipBecauseBroken`

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::apps::errors::{LifecycleError, LifecyclePhase, Operation, OrchestratorError};
use crate::apps::registration::Registration;
use crate::apps::status::AppStatus;
use crate::lifecycle::reroute::RerouteReason;
use crate::lifecycle::settlement::{SettleResult, Settlement, Settler};
use crate::observability::metrics;
use crate::orchestrator::Orchestrator;

/// State of a pending unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingUnload {
    /// Deferred until the application is inactive and idle.
    Waiting,
    /// Immediate teardown in flight.
    Tearing,
}

/// Options for [`Orchestrator::unload_application`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnloadOptions {
    /// Wait for the application to be unmounted naturally instead of tearing
    /// it down now.
    pub wait_for_unmount: bool,
}

impl UnloadOptions {
    pub fn waiting() -> Self {
        Self {
            wait_for_unmount: true,
        }
    }

    pub fn immediate() -> Self {
        Self {
            wait_for_unmount: false,
        }
    }

    fn label(&self) -> &'static str {
        if self.wait_for_unmount {
            "waiting"
        } else {
            "immediate"
        }
    }
}

/// The dedupe record for one application.
#[derive(Debug)]
pub struct UnloadWaiter {
    state: PendingUnload,
    handle: Settlement,
    settler: Settler,
}

/// Outcome of joining the waiter table.
#[derive(Debug)]
pub struct UnloadTicket {
    pub handle: Settlement,
    /// The caller must start the teardown.
    pub start_teardown: bool,
    /// The request joined an existing record.
    pub joined: bool,
}

/// Side table of pending unloads, keyed by application name.
#[derive(Debug, Default)]
pub struct UnloadTable {
    waiters: HashMap<String, UnloadWaiter>,
}

impl UnloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, name: &str) -> Option<PendingUnload> {
        self.waiters.get(name).map(|w| w.state)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Create or join the record for `name`.
    pub fn request(&mut self, name: &str, options: UnloadOptions) -> UnloadTicket {
        let immediate = !options.wait_for_unmount;

        if let Some(waiter) = self.waiters.get_mut(name) {
            let start_teardown = immediate && waiter.state == PendingUnload::Waiting;
            if start_teardown {
                waiter.state = PendingUnload::Tearing;
            }
            return UnloadTicket {
                handle: waiter.handle.clone(),
                start_teardown,
                joined: true,
            };
        }

        let (settler, handle) = Settlement::new(name);
        let state = if immediate {
            PendingUnload::Tearing
        } else {
            PendingUnload::Waiting
        };
        self.waiters.insert(
            name.to_string(),
            UnloadWaiter {
                state,
                handle: handle.clone(),
                settler,
            },
        );

        UnloadTicket {
            handle,
            start_teardown: immediate,
            joined: false,
        }
    }

    /// Remove the record for `name` and settle it. Returns false if there was
    /// no record.
    pub fn settle(&mut self, name: &str, result: SettleResult) -> bool {
        match self.waiters.remove(name) {
            Some(waiter) => {
                waiter.settler.settle(result);
                true
            }
            None => false,
        }
    }

    /// Like [`settle`](Self::settle), but leaves a `Tearing` record to its
    /// teardown.
    pub fn settle_waiting(&mut self, name: &str, result: SettleResult) -> bool {
        if self.pending(name) != Some(PendingUnload::Waiting) {
            return false;
        }
        self.settle(name, result)
    }
}

/// Next action of an immediate teardown.
enum TeardownStep {
    /// A lifecycle step is in flight; wait for it to finish.
    Wait(AppStatus),
    Unmount(Arc<Registration>),
    Unload(Arc<Registration>),
    Done,
}

impl Orchestrator {
    /// Request that `name` be unloaded.
    ///
    /// Every caller asking for the same application before it settles gets
    /// the same [`Settlement`]. In immediate mode the unmount → unload chain
    /// starts now; in waiting mode it starts once the change set offers the
    /// application for unloading.
    ///
    /// Must be called within a Tokio runtime.
    pub fn unload_application(
        &self,
        name: &str,
        options: UnloadOptions,
    ) -> Result<Settlement, OrchestratorError> {
        if name.is_empty() {
            return Err(OrchestratorError::InvalidUnloadName);
        }

        let ticket = self.with_state(|state| {
            if !state.registry.contains(name) {
                return Err(OrchestratorError::not_registered(name, Operation::Unload));
            }
            Ok(state.unloads.request(name, options))
        })?;

        tracing::info!(
            app = %name,
            mode = options.label(),
            joined = ticket.joined,
            "Unload requested"
        );
        metrics::record_unload_request(options.label(), ticket.joined);

        if ticket.start_teardown {
            let orchestrator = self.clone();
            let app = name.to_string();
            let span = tracing::info_span!("teardown", app = %name);
            tokio::spawn(async move { orchestrator.tear_down(app).await }.instrument(span));
        }

        Ok(ticket.handle)
    }

    /// Unload `name`, then remove it from the registry.
    ///
    /// If the teardown fails the application stays registered and the
    /// returned settlement rejects with the failure.
    pub fn unregister_application(&self, name: &str) -> Result<Settlement, OrchestratorError> {
        if !self.with_state(|state| state.registry.contains(name)) {
            return Err(OrchestratorError::not_registered(name, Operation::Unregister));
        }

        let unload = self.unload_application(name, UnloadOptions::immediate())?;
        let (settler, removed) = Settlement::new(name);
        let orchestrator = self.clone();
        let app = name.to_string();

        tokio::spawn(async move {
            let result = unload.await;
            match &result {
                Ok(()) => orchestrator.remove(&app),
                Err(e) => tracing::warn!(app = %app, error = %e, "Unregister failed, keeping application"),
            }
            settler.settle(result);
        });

        Ok(removed)
    }

    /// Report the outcome of a scheduler-driven unload (the `to_unload` list).
    ///
    /// The scheduler moves the application to `Unloading` before running its
    /// unload lifecycle, then calls this with the result.
    pub fn finish_unload(&self, name: &str, result: SettleResult) -> Result<(), OrchestratorError> {
        let next = match &result {
            Ok(()) => AppStatus::NotLoaded,
            Err(_) => AppStatus::SkipBecauseBroken,
        };
        self.transition(name, next)?;

        let settled = self.with_state(|state| state.unloads.settle_waiting(name, result));
        if settled {
            tracing::debug!(app = %name, "Unload waiters settled");
        }
        Ok(())
    }

    async fn tear_down(self, name: String) {
        let result = self.run_teardown(&name).await;
        match &result {
            Ok(()) => tracing::info!(app = %name, "Application unloaded"),
            Err(e) => tracing::warn!(app = %name, error = %e, "Unload failed"),
        }
        metrics::record_unload_outcome(result.is_ok());

        self.with_state(|state| state.unloads.settle(&name, result));
        self.post_reroute(RerouteReason::Unloaded(name));
    }

    async fn run_teardown(&self, name: &str) -> SettleResult {
        loop {
            let changed = self.status_changed();

            match self.next_teardown_step(name)? {
                TeardownStep::Wait(status) => {
                    tracing::debug!(app = %name, %status, "Waiting for in-flight lifecycle step");
                    changed.await;
                }
                TeardownStep::Unmount(registration) => {
                    match self.driver().unmount(registration).await {
                        Ok(()) => self.teardown_transition(name, AppStatus::NotMounted, LifecyclePhase::Unmount)?,
                        Err(e) => return Err(self.mark_broken(name, e)),
                    }
                }
                TeardownStep::Unload(registration) => {
                    match self.driver().unload(registration).await {
                        Ok(()) => self.teardown_transition(name, AppStatus::NotLoaded, LifecyclePhase::Unload)?,
                        Err(e) => return Err(self.mark_broken(name, e)),
                    }
                }
                TeardownStep::Done => return Ok(()),
            }
        }
    }

    /// Inspect the current status and claim the next teardown step.
    fn next_teardown_step(&self, name: &str) -> Result<TeardownStep, LifecycleError> {
        let (status, registration) = self
            .with_state(|state| {
                state
                    .registry
                    .get(name)
                    .map(|app| (app.status(), app.registration().clone()))
            })
            .ok_or_else(|| LifecycleError::new(name, LifecyclePhase::Unload, "no longer registered"))?;

        let step = match status {
            status if status.is_transitional() => TeardownStep::Wait(status),
            AppStatus::Mounted => {
                self.teardown_transition(name, AppStatus::Unmounting, LifecyclePhase::Unmount)?;
                TeardownStep::Unmount(registration)
            }
            AppStatus::NotBootstrapped | AppStatus::NotMounted => {
                self.teardown_transition(name, AppStatus::Unloading, LifecyclePhase::Unload)?;
                TeardownStep::Unload(registration)
            }
            AppStatus::LoadError | AppStatus::SkipBecauseBroken => {
                self.teardown_transition(name, AppStatus::NotLoaded, LifecyclePhase::Unload)?;
                TeardownStep::Done
            }
            _ => TeardownStep::Done,
        };
        Ok(step)
    }

    fn teardown_transition(
        &self,
        name: &str,
        next: AppStatus,
        phase: LifecyclePhase,
    ) -> Result<(), LifecycleError> {
        self.transition(name, next)
            .map(|_| ())
            .map_err(|e| LifecycleError::new(name, phase, e.to_string()))
    }

    fn mark_broken(&self, name: &str, error: LifecycleError) -> LifecycleError {
        if let Err(e) = self.transition(name, AppStatus::SkipBecauseBroken) {
            tracing::error!(app = %name, error = %e, "Could not mark application broken");
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_requests_share_one_record() {
        let mut table = UnloadTable::new();
        let first = table.request("a", UnloadOptions::waiting());
        let second = table.request("a", UnloadOptions::waiting());

        assert!(first.handle.same_as(&second.handle));
        assert!(!first.start_teardown && !second.start_teardown);
        assert!(!first.joined && second.joined);
        assert_eq!(table.pending("a"), Some(PendingUnload::Waiting));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_immediate_upgrades_waiting_once() {
        let mut table = UnloadTable::new();
        let waiting = table.request("a", UnloadOptions::waiting());
        let first = table.request("a", UnloadOptions::immediate());
        let second = table.request("a", UnloadOptions::immediate());

        assert!(waiting.handle.same_as(&first.handle));
        assert!(first.start_teardown);
        assert!(!second.start_teardown);
        assert_eq!(table.pending("a"), Some(PendingUnload::Tearing));
    }

    #[test]
    fn test_immediate_without_record_starts_teardown() {
        let mut table = UnloadTable::new();
        let ticket = table.request("a", UnloadOptions::default());
        assert!(ticket.start_teardown);
        assert_eq!(table.pending("a"), Some(PendingUnload::Tearing));

        let waiting = table.request("a", UnloadOptions::waiting());
        assert!(!waiting.start_teardown);
        assert!(waiting.handle.same_as(&ticket.handle));
    }

    #[tokio::test]
    async fn test_settle_clears_record() {
        let mut table = UnloadTable::new();
        let ticket = table.request("a", UnloadOptions::waiting());

        assert!(table.settle("a", Ok(())));
        assert!(table.is_empty());
        assert!(!table.settle("a", Ok(())));
        assert_eq!(ticket.handle.await, Ok(()));

        let fresh = table.request("a", UnloadOptions::waiting());
        assert!(!fresh.joined);
    }

    #[test]
    fn test_settle_waiting_skips_tearing() {
        let mut table = UnloadTable::new();
        table.request("a", UnloadOptions::immediate());
        assert!(!table.settle_waiting("a", Ok(())));
        assert_eq!(table.pending("a"), Some(PendingUnload::Tearing));
    }
}
