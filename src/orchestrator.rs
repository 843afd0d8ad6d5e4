//! The orchestrator facade.
//!
//! # Responsibilities
//! - Own the registry, the unload waiter table and the started flag
//! - Expose registration, lookups, change sets and status transitions
//! - Wake status waiters and record metrics on every transition
//! - Hand out the reroute loop and pass subscriptions
//!
//! # Design Decisions
//! - One std mutex guards all mutable state; it is never held across an
//!   await point, so every locked section is a short synchronous step
//! - Cloning is cheap (`Arc`); background tasks hold their own clone
//! - Lifecycle execution is delegated to a [`LifecycleDriver`]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::futures::Notified;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::Instant;

use crate::apps::changes::{calculate_changes, ChangeSet};
use crate::apps::errors::{LifecycleError, LifecyclePhase, Operation, OrchestratorError};
use crate::apps::manifest::{AppManifest, ModuleResolver};
use crate::apps::registration::{AppConfig, RegisterArgs, Registration};
use crate::apps::registry::{AppRegistry, AppSnapshot, Parcels};
use crate::apps::status::AppStatus;
use crate::config::schema::CoreConfig;
use crate::lifecycle::driver::LifecycleDriver;
use crate::lifecycle::reroute::{RecomputePass, RerouteLoop, RerouteQueue, RerouteReason};
use crate::lifecycle::start::StartWatchdog;
use crate::lifecycle::unload::UnloadTable;
use crate::observability::metrics;
use crate::routing::Location;

/// Mutable state behind the orchestrator's lock.
pub(crate) struct State {
    pub(crate) registry: AppRegistry,
    pub(crate) unloads: UnloadTable,
    pub(crate) started: bool,
    pub(crate) url_reroute_only: bool,
}

struct Shared {
    state: Mutex<State>,
    driver: Arc<dyn LifecycleDriver>,
    queue: RerouteQueue,
    reroute_rx: Mutex<Option<mpsc::UnboundedReceiver<RerouteReason>>>,
    passes: broadcast::Sender<RecomputePass>,
    status_changed: Notify,
    config: CoreConfig,
}

/// Handle to one orchestrator instance.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(config: CoreConfig, driver: Arc<dyn LifecycleDriver>) -> Self {
        let (queue, rx) = RerouteQueue::new();
        let (passes, _) = broadcast::channel(64);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    registry: AppRegistry::new(),
                    unloads: UnloadTable::new(),
                    started: false,
                    url_reroute_only: false,
                }),
                driver,
                queue,
                reroute_rx: Mutex::new(Some(rx)),
                passes,
                status_changed: Notify::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.shared.config
    }

    pub fn load_retry_cooldown(&self) -> Duration {
        self.shared.config.load_retry_cooldown()
    }

    // --- registration -----------------------------------------------------

    /// Validate and register an application in either accepted shape.
    pub fn register_application(&self, args: RegisterArgs) -> Result<(), OrchestratorError> {
        let result = Registration::sanitize(args).and_then(|registration| {
            let name = registration.name().to_string();
            self.with_state(|state| {
                state.registry.insert(registration)?;
                Ok::<_, OrchestratorError>((name, state.registry.len()))
            })
        });
        metrics::record_registration(result.is_ok());

        let (name, count) = result?;
        metrics::record_registered_apps(count);
        tracing::info!(app = %name, registered = count, "Application registered");

        if self.shared.config.reroute_on_register {
            self.post_reroute(RerouteReason::Registered(name));
        }
        Ok(())
    }

    pub fn register(&self, config: AppConfig) -> Result<(), OrchestratorError> {
        self.register_application(RegisterArgs::Config(config))
    }

    /// Register a validated manifest entry, resolving its module specifier.
    pub fn register_manifest(
        &self,
        manifest: AppManifest,
        resolver: &dyn ModuleResolver,
    ) -> Result<(), OrchestratorError> {
        self.register(manifest.into_config(resolver))
    }

    /// Drop `name` from the registry. Used once its unload has settled.
    ///
    /// An unload record created after that settlement is rejected in the same
    /// locked step, so it can neither hang nor leak into a later registration
    /// of the same name.
    pub(crate) fn remove(&self, name: &str) {
        let (removed, orphaned) = self.with_state(|state| {
            let removed = state
                .registry
                .remove(name)
                .map(|_| state.registry.len());
            let error = LifecycleError::new(name, LifecyclePhase::Unload, "application was unregistered");
            let orphaned = state.unloads.settle(name, Err(error));
            (removed, orphaned)
        });
        if orphaned {
            tracing::warn!(app = %name, "Rejected unload requested during unregister");
        }
        if let Some(count) = removed {
            metrics::record_registered_apps(count);
            tracing::info!(app = %name, registered = count, "Application unregistered");
            self.shared.status_changed.notify_waiters();
        }
    }

    // --- lookups ----------------------------------------------------------

    pub fn app_names(&self) -> Vec<String> {
        self.with_state(|state| state.registry.names())
    }

    pub fn mounted_app_names(&self) -> Vec<String> {
        self.with_state(|state| state.registry.mounted_names())
    }

    /// Status of `name`, or `None` when it is not registered.
    pub fn app_status(&self, name: &str) -> Option<AppStatus> {
        self.with_state(|state| state.registry.status(name))
    }

    /// Names of the applications whose activation rule matches `location`.
    /// Activation predicates run under the state lock.
    pub fn active_app_names(&self, location: &Location) -> Vec<String> {
        self.with_state(|state| state.registry.active_names(location))
    }

    pub fn snapshot(&self) -> Vec<AppSnapshot> {
        let now = Instant::now();
        self.with_state(|state| {
            state
                .registry
                .iter()
                .map(|app| app.snapshot(now, state.unloads.pending(app.name()).is_some()))
                .collect()
        })
    }

    // --- change sets and transitions --------------------------------------

    pub fn changes(&self, location: &Location) -> ChangeSet {
        self.changes_at(location, Instant::now())
    }

    /// Change set for `location` as of `now`. Before `start`, only loads are
    /// offered. Activation predicates run under the state lock.
    pub fn changes_at(&self, location: &Location, now: Instant) -> ChangeSet {
        let cooldown = self.load_retry_cooldown();
        self.with_state(|state| {
            let changes = calculate_changes(state.registry.iter(), location, now, cooldown, |name: &str| {
                state.unloads.pending(name)
            });
            if state.started {
                changes
            } else {
                changes.before_start()
            }
        })
    }

    /// Move `name` to `next` if the state machine allows it. Returns the
    /// previous status.
    pub fn transition(&self, name: &str, next: AppStatus) -> Result<AppStatus, OrchestratorError> {
        let now = Instant::now();
        let previous = self.with_state(|state| state.registry.transition(name, next, now))?;

        self.shared.status_changed.notify_waiters();
        metrics::record_transition(next);
        tracing::debug!(app = %name, from = %previous, to = %next, "Status changed");
        Ok(previous)
    }

    /// Run `f` against the parcels of `name`.
    ///
    /// `f` runs under the state lock and must not call back into the
    /// orchestrator; doing so deadlocks.
    pub fn with_parcels<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Parcels) -> R,
    ) -> Result<R, OrchestratorError> {
        self.with_state(|state| {
            state
                .registry
                .get_mut(name)
                .map(|app| f(app.parcels_mut()))
                .ok_or_else(|| OrchestratorError::not_registered(name, Operation::Parcels))
        })
    }

    // --- background work --------------------------------------------------

    /// Take the reroute loop. Returns `None` after the first call.
    pub fn reroute_loop(&self) -> Option<RerouteLoop> {
        let rx = self
            .shared
            .reroute_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(RerouteLoop::new(self.clone(), rx))
    }

    /// Receive every completed recomputation pass.
    pub fn subscribe_reroutes(&self) -> broadcast::Receiver<RecomputePass> {
        self.shared.passes.subscribe()
    }

    /// Watchdog warning if `start` is not called within the configured grace
    /// period.
    pub fn start_watchdog(&self) -> StartWatchdog {
        StartWatchdog::new(self.clone(), self.shared.config.start_warning())
    }

    /// Request a recomputation pass after the current turn.
    pub fn post_reroute(&self, reason: RerouteReason) {
        self.shared.queue.post(reason);
    }

    // --- crate internals --------------------------------------------------

    pub(crate) fn driver(&self) -> &Arc<dyn LifecycleDriver> {
        &self.shared.driver
    }

    pub(crate) fn publish_pass(&self, pass: RecomputePass) {
        // No subscribers is the common case.
        let _ = self.shared.passes.send(pass);
    }

    /// Future completing at the next status change. Registered on creation,
    /// so create it before inspecting the status.
    pub(crate) fn status_changed(&self) -> Notified<'_> {
        self.shared.status_changed.notified()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("apps", &self.app_names())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
