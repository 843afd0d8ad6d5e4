//! Dry-run scheduling for the `plan` command.
//!
//! Applies change sets by walking statuses through the state machine without
//! running any lifecycle code, so a manifest can be checked against a list of
//! locations.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;

use spa_orchestrator::apps::{AppLoader, LifecycleFuture, Lifecycles, ModuleResolver, Props, Registration};
use spa_orchestrator::{AppStatus, ChangeSet, Location, Orchestrator, OrchestratorError, RecomputePass};
use spa_orchestrator::LifecycleDriver;

/// Upper bound on change sets applied per location.
const MAX_ROUNDS: usize = 8;

/// Driver that succeeds at everything and only logs.
pub struct DryRunDriver;

impl LifecycleDriver for DryRunDriver {
    fn unmount(&self, app: Arc<Registration>) -> LifecycleFuture {
        tracing::debug!(app = %app.name(), "dry-run unmount");
        async { Ok(()) }.boxed()
    }

    fn unload(&self, app: Arc<Registration>) -> LifecycleFuture {
        tracing::debug!(app = %app.name(), "dry-run unload");
        async { Ok(()) }.boxed()
    }

    fn reroute(&self, pass: RecomputePass) -> BoxFuture<'static, ()> {
        tracing::debug!(sequence = pass.sequence, folded = pass.reasons.len(), "dry-run pass");
        async {}.boxed()
    }
}

/// Module with no-op lifecycles.
struct Placeholder;

impl Lifecycles for Placeholder {
    fn bootstrap(&self, _props: Props) -> LifecycleFuture {
        async { Ok(()) }.boxed()
    }

    fn mount(&self, _props: Props) -> LifecycleFuture {
        async { Ok(()) }.boxed()
    }

    fn unmount(&self, _props: Props) -> LifecycleFuture {
        async { Ok(()) }.boxed()
    }
}

/// Resolves every module specifier to a [`Placeholder`].
pub struct PlaceholderResolver;

impl ModuleResolver for PlaceholderResolver {
    fn resolve(&self, specifier: &str) -> Arc<dyn AppLoader> {
        tracing::debug!(module = %specifier, "Resolving module as placeholder");
        spa_orchestrator::apps::loader_fn(|_props| async { Ok(Arc::new(Placeholder) as Arc<dyn Lifecycles>) })
    }
}

/// What happened at one location.
#[derive(Debug, Serialize)]
pub struct PlanStep {
    pub url: String,
    pub rerouted: bool,
    pub rounds: Vec<ChangeSet>,
    pub mounted: Vec<String>,
}

/// Apply change sets for `location` until nothing is left to do.
pub fn settle(orchestrator: &Orchestrator, location: &Location) -> Result<Vec<ChangeSet>, OrchestratorError> {
    let mut rounds = Vec::new();

    for _ in 0..MAX_ROUNDS {
        let changes = orchestrator.changes(location);
        if changes.is_empty() {
            break;
        }
        apply(orchestrator, &changes)?;
        rounds.push(changes);
    }

    Ok(rounds)
}

fn apply(orchestrator: &Orchestrator, changes: &ChangeSet) -> Result<(), OrchestratorError> {
    for name in &changes.to_unmount {
        walk(orchestrator, name, &[AppStatus::Unmounting, AppStatus::NotMounted])?;
    }
    for name in &changes.to_unload {
        orchestrator.transition(name, AppStatus::Unloading)?;
        orchestrator.finish_unload(name, Ok(()))?;
    }
    for name in &changes.to_load {
        // A load already in flight only needs to finish.
        if orchestrator.app_status(name) != Some(AppStatus::LoadingSourceCode) {
            orchestrator.transition(name, AppStatus::LoadingSourceCode)?;
        }
        orchestrator.transition(name, AppStatus::NotBootstrapped)?;
    }
    for name in &changes.to_mount {
        if orchestrator.app_status(name) == Some(AppStatus::NotBootstrapped) {
            walk(orchestrator, name, &[AppStatus::Bootstrapping, AppStatus::NotMounted])?;
        }
        walk(orchestrator, name, &[AppStatus::Mounting, AppStatus::Mounted])?;
    }
    Ok(())
}

fn walk(orchestrator: &Orchestrator, name: &str, path: &[AppStatus]) -> Result<(), OrchestratorError> {
    for status in path {
        orchestrator.transition(name, *status)?;
    }
    Ok(())
}
