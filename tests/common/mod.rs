//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Notify;

use spa_orchestrator::apps::{
    AppConfig, AppSource, LifecycleFuture, LifecyclePhase, Lifecycles, Props, Registration,
};
use spa_orchestrator::config::CoreConfig;
use spa_orchestrator::lifecycle::RerouteReason;
use spa_orchestrator::{
    ActiveWhen, AppStatus, LifecycleDriver, LifecycleError, Location, Orchestrator,
    RecomputePass, Shutdown,
};

/// Something the driver or a test observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Unmount(String),
    Unload(String),
    Reroute {
        sequence: u64,
        reasons: Vec<RerouteReason>,
        started: bool,
    },
    /// Pushed by tests when a settlement resolves.
    Settled(String),
}

/// Driver recording every call, with injectable failures and an unmount gate.
#[derive(Default)]
pub struct RecordingDriver {
    events: Arc<Mutex<Vec<Event>>>,
    failures: Mutex<HashSet<(String, LifecyclePhase)>>,
    gated: Mutex<bool>,
    gate: Arc<Notify>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, app: &str, phase: LifecyclePhase) {
        self.failures.lock().unwrap().insert((app.to_string(), phase));
    }

    /// Make unmount calls block until [`release`](Self::release).
    pub fn hold_unmounts(&self) {
        *self.gated.lock().unwrap() = true;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn reroutes(&self) -> Vec<(u64, Vec<RerouteReason>, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Reroute {
                    sequence,
                    reasons,
                    started,
                } => Some((sequence, reasons, started)),
                _ => None,
            })
            .collect()
    }

    fn outcome(&self, app: &str, phase: LifecyclePhase) -> Result<(), LifecycleError> {
        if self.failures.lock().unwrap().contains(&(app.to_string(), phase)) {
            Err(LifecycleError::new(app, phase, "injected failure"))
        } else {
            Ok(())
        }
    }
}

impl LifecycleDriver for RecordingDriver {
    fn unmount(&self, app: Arc<Registration>) -> LifecycleFuture {
        let name = app.name().to_string();
        self.push(Event::Unmount(name.clone()));
        let result = self.outcome(&name, LifecyclePhase::Unmount);
        let gate = (*self.gated.lock().unwrap()).then(|| self.gate.clone());

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        }
        .boxed()
    }

    fn unload(&self, app: Arc<Registration>) -> LifecycleFuture {
        let name = app.name().to_string();
        self.push(Event::Unload(name.clone()));
        let result = self.outcome(&name, LifecyclePhase::Unload);
        async move { result }.boxed()
    }

    fn reroute(&self, pass: RecomputePass) -> BoxFuture<'static, ()> {
        self.push(Event::Reroute {
            sequence: pass.sequence,
            reasons: pass.reasons,
            started: pass.started,
        });
        async {}.boxed()
    }
}

/// Module whose lifecycles all succeed.
pub struct NoopApp;

impl Lifecycles for NoopApp {
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

pub fn app(name: &str, active_when: impl Into<ActiveWhen>) -> AppConfig {
    AppConfig {
        name: name.to_string(),
        app: AppSource::Value(Arc::new(NoopApp)),
        active_when: active_when.into(),
        custom_props: None,
    }
}

pub fn loc(href: &str) -> Location {
    Location::parse(href).unwrap()
}

/// An orchestrator with a recording driver and a running reroute loop.
pub struct Fixture {
    pub orchestrator: Orchestrator,
    pub driver: Arc<RecordingDriver>,
    pub shutdown: Shutdown,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        let driver = RecordingDriver::new();
        let orchestrator = Orchestrator::new(config, driver.clone());
        let shutdown = Shutdown::new();

        let reroute = orchestrator.reroute_loop().unwrap();
        tokio::spawn(reroute.run(shutdown.subscribe()));

        Self {
            orchestrator,
            driver,
            shutdown,
        }
    }

    /// Walk `name` through the state machine.
    pub fn walk(&self, name: &str, path: &[AppStatus]) {
        for status in path {
            self.orchestrator.transition(name, *status).unwrap();
        }
    }

    pub fn mount(&self, name: &str) {
        self.walk(name, &TO_MOUNTED);
    }

    pub fn load_and_bootstrap(&self, name: &str) {
        self.walk(name, &TO_MOUNTED[..4]);
    }
}

pub const TO_MOUNTED: [AppStatus; 6] = [
    AppStatus::LoadingSourceCode,
    AppStatus::NotBootstrapped,
    AppStatus::Bootstrapping,
    AppStatus::NotMounted,
    AppStatus::Mounting,
    AppStatus::Mounted,
];

/// Let spawned tasks run until they block.
pub async fn settle_tasks() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
