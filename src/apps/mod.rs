//! Application registry subsystem.
//!
//! # Data Flow
//! ```text
//! RegisterArgs / manifest record
//!     → Registration::sanitize (manifest.rs, registration.rs)
//!     → AppRegistry::insert (registry.rs)
//!     → calculate_changes (changes.rs) → ChangeSet for the scheduler
//! ```

pub mod changes;
pub mod errors;
pub mod manifest;
pub mod registration;
pub mod registry;
pub mod status;

pub use changes::{calculate_changes, ChangeSet, DEFAULT_LOAD_RETRY_COOLDOWN};
pub use errors::{ErrorKind, LifecycleError, LifecyclePhase, Operation, OrchestratorError};
pub use manifest::{AppManifest, ModuleResolver};
pub use registration::{
    loader_fn, AppConfig, AppLoader, AppSource, CustomProps, DynamicProps, LifecycleFuture,
    Lifecycles, Props, ReadyLoader, RegisterArgs, Registration,
};
pub use registry::{AppRegistry, AppSnapshot, Application, Parcels};
pub use status::AppStatus;
