//! Application registry.
//!
//! # Responsibilities
//! - Store registered applications in registration order
//! - Enforce unique names
//! - Answer lookups (names, mounted names, status, active names)
//! - Apply status transitions admitted by the state machine
//!
//! # Design Decisions
//! - Plain table with no interior locking; the orchestrator owns it behind
//!   one mutex and never holds that lock across an await point
//! - Unknown names are reported as `None`; callers pick the error code

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::apps::errors::{Operation, OrchestratorError};
use crate::apps::registration::{Props, Registration};
use crate::apps::status::AppStatus;
use crate::routing::Location;

/// Child-module handles created by an application. Opaque to the registry.
pub type Parcels = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// One registry entry.
pub struct Application {
    registration: Arc<Registration>,
    status: AppStatus,
    load_error_time: Option<Instant>,
    parcels: Parcels,
}

impl Application {
    fn new(registration: Registration) -> Self {
        Self {
            registration: Arc::new(registration),
            status: AppStatus::NotLoaded,
            load_error_time: None,
            parcels: Parcels::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.registration.name()
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn load_error_time(&self) -> Option<Instant> {
        self.load_error_time
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    pub fn parcels(&self) -> &Parcels {
        &self.parcels
    }

    pub fn parcels_mut(&mut self) -> &mut Parcels {
        &mut self.parcels
    }

    /// Broken applications are never considered active.
    pub fn should_be_active(&self, location: &Location) -> bool {
        !self.status.is_broken() && self.registration.is_active(location)
    }

    pub fn snapshot(&self, now: Instant, unload_pending: bool) -> AppSnapshot {
        AppSnapshot {
            name: self.name().to_string(),
            status: self.status,
            load_error_age_ms: self
                .load_error_time
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            unload_pending,
            parcel_count: self.parcels.len(),
            custom_props: self.registration.custom_props().as_static().cloned(),
        }
    }
}

/// Diagnostic view of one application.
#[derive(Debug, Clone, Serialize)]
pub struct AppSnapshot {
    pub name: String,
    pub status: AppStatus,
    pub load_error_age_ms: Option<u64>,
    pub unload_pending: bool,
    pub parcel_count: usize,
    pub custom_props: Option<Props>,
}

/// The table of registered applications.
#[derive(Default)]
pub struct AppRegistry {
    apps: Vec<Application>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new application with status `NotLoaded`.
    pub fn insert(&mut self, registration: Registration) -> Result<&Application, OrchestratorError> {
        if self.contains(registration.name()) {
            return Err(OrchestratorError::DuplicateName(registration.name().to_string()));
        }
        self.apps.push(Application::new(registration));
        let index = self.apps.len() - 1;
        Ok(&self.apps[index])
    }

    pub fn remove(&mut self, name: &str) -> Option<Application> {
        let index = self.apps.iter().position(|app| app.name() == name)?;
        Some(self.apps.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Application> {
        self.apps.iter().find(|app| app.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Application> {
        self.apps.iter_mut().find(|app| app.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Application> {
        self.apps.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.apps.iter().map(|app| app.name().to_string()).collect()
    }

    pub fn mounted_names(&self) -> Vec<String> {
        self.apps
            .iter()
            .filter(|app| app.status.is_mounted())
            .map(|app| app.name().to_string())
            .collect()
    }

    /// Status of `name`, or `None` when it is not registered.
    pub fn status(&self, name: &str) -> Option<AppStatus> {
        self.get(name).map(Application::status)
    }

    /// Names whose activation rule matches `location`.
    pub fn active_names(&self, location: &Location) -> Vec<String> {
        self.apps
            .iter()
            .filter(|app| app.registration.is_active(location))
            .map(|app| app.name().to_string())
            .collect()
    }

    /// Move `name` to `next` if the state machine allows it.
    ///
    /// Entering `LoadError` stamps the failure time; returning to `NotLoaded`
    /// clears it. Returns the previous status.
    pub fn transition(
        &mut self,
        name: &str,
        next: AppStatus,
        now: Instant,
    ) -> Result<AppStatus, OrchestratorError> {
        let app = self
            .get_mut(name)
            .ok_or_else(|| OrchestratorError::not_registered(name, Operation::Transition))?;

        let previous = app.status;
        if !previous.can_transition_to(next) {
            return Err(OrchestratorError::IllegalTransition {
                name: name.to_string(),
                from: previous,
                to: next,
            });
        }

        app.status = next;
        match next {
            AppStatus::LoadError => app.load_error_time = Some(now),
            AppStatus::NotLoaded => app.load_error_time = None,
            _ => {}
        }
        Ok(previous)
    }
}
