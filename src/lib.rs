//! Micro-frontend orchestration core.
//!
//! Keeps a registry of independently deployable applications, decides which
//! of them should be loaded, mounted, unmounted or unloaded for the current
//! location, and coordinates deduplicated unloads. Executing the lifecycle
//! functions is left to a host-provided [`LifecycleDriver`].

pub mod apps;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod routing;

pub use apps::{
    AppConfig, AppManifest, AppSource, AppStatus, ChangeSet, LifecycleError, ModuleResolver,
    OrchestratorError, RegisterArgs,
};
pub use config::OrchestratorConfig;
pub use lifecycle::{
    LifecycleDriver, NavigationSource, RecomputePass, Settlement, Shutdown, StartOptions,
    UnloadOptions,
};
pub use orchestrator::Orchestrator;
pub use routing::{ActiveWhen, Location};
