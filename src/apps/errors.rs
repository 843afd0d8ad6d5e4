//! Error taxonomy for the application registry.
//!
//! Every synchronous failure carries a stable numeric code. Callers branch on
//! [`OrchestratorError::code`] or [`OrchestratorError::kind`], never on the
//! message text.

use serde::Serialize;
use thiserror::Error;

use crate::apps::status::AppStatus;

/// Warning code surfaced when `start` was never called.
pub const START_NOT_CALLED_CODE: u16 = 1;

/// Coarse classification of an [`OrchestratorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    DuplicateName,
    NotRegistered,
    InvalidArgument,
    InvalidConfig,
    IllegalTransition,
}

/// Which public operation rejected an unknown application name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Unregister,
    Unload,
    Transition,
    Parcels,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Operation::Unregister => "unregister",
            Operation::Unload => "unload",
            Operation::Transition => "transition",
            Operation::Parcels => "access parcels of",
        };
        f.write_str(verb)
    }
}

/// Errors raised synchronously by registry and coordinator operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Application name is missing or empty.
    #[error("#20: the application name must be a non-empty string")]
    InvalidName,

    /// The `app` entry of a registration is missing or of the wrong shape.
    #[error("#{code}: {reason}")]
    InvalidApp { code: u16, reason: String },

    /// Another application already uses this name.
    #[error("#21: there is already an app registered with name {0}")]
    DuplicateName(String),

    /// Custom props are neither omitted, a mapping, nor a function.
    #[error("#22: customProps must be an object")]
    InvalidCustomProps,

    /// Activation rule could not be turned into a predicate.
    #[error("#24: activeWhen must be a string, a function or an array of both ({0})")]
    InvalidActiveWhen(String),

    /// Operation referenced a name that is not in the registry.
    #[error("#{}: cannot {} application '{}' because no such application has been registered", .operation.code(), .operation, .name)]
    NotRegistered { name: String, operation: Operation },

    /// Unload requested without a usable name.
    #[error("#26: unloading an application requires a non-empty name")]
    InvalidUnloadName,

    /// Configuration record carried keys outside the accepted set.
    #[error("#38: the configuration object accepts only: {}. Invalid keys: {}.", VALID_CONFIG_KEYS.join(", "), .invalid.join(", "))]
    InvalidConfigKeys { invalid: Vec<String> },

    /// Configuration record is not a key/value record.
    #[error("#39: configuration object can't be an array or null")]
    InvalidConfigShape,

    /// The lifecycle state machine does not allow this step.
    #[error("#40: application '{name}' cannot move from {from} to {to}")]
    IllegalTransition {
        name: String,
        from: AppStatus,
        to: AppStatus,
    },
}

/// Keys accepted in a configuration record.
pub const VALID_CONFIG_KEYS: [&str; 4] = ["name", "app", "activeWhen", "customProps"];

impl Operation {
    fn code(&self) -> u16 {
        match self {
            Operation::Unregister => 25,
            Operation::Unload => 27,
            Operation::Transition | Operation::Parcels => 41,
        }
    }
}

impl OrchestratorError {
    /// Stable numeric code of this error.
    pub fn code(&self) -> u16 {
        match self {
            OrchestratorError::InvalidName => 20,
            OrchestratorError::InvalidApp { code, .. } => *code,
            OrchestratorError::DuplicateName(_) => 21,
            OrchestratorError::InvalidCustomProps => 22,
            OrchestratorError::InvalidActiveWhen(_) => 24,
            OrchestratorError::NotRegistered { operation, .. } => operation.code(),
            OrchestratorError::InvalidUnloadName => 26,
            OrchestratorError::InvalidConfigKeys { .. } => 38,
            OrchestratorError::InvalidConfigShape => 39,
            OrchestratorError::IllegalTransition { .. } => 40,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::DuplicateName(_) => ErrorKind::DuplicateName,
            OrchestratorError::NotRegistered { .. } => ErrorKind::NotRegistered,
            OrchestratorError::InvalidConfigKeys { .. } => ErrorKind::InvalidConfig,
            OrchestratorError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            OrchestratorError::InvalidName
            | OrchestratorError::InvalidApp { .. }
            | OrchestratorError::InvalidCustomProps
            | OrchestratorError::InvalidActiveWhen(_)
            | OrchestratorError::InvalidUnloadName
            | OrchestratorError::InvalidConfigShape => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn not_registered(name: &str, operation: Operation) -> Self {
        OrchestratorError::NotRegistered {
            name: name.to_string(),
            operation,
        }
    }
}

/// Lifecycle step that failed asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Load,
    Bootstrap,
    Mount,
    Update,
    Unmount,
    Unload,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            LifecyclePhase::Load => "load",
            LifecyclePhase::Bootstrap => "bootstrap",
            LifecyclePhase::Mount => "mount",
            LifecyclePhase::Update => "update",
            LifecyclePhase::Unmount => "unmount",
            LifecyclePhase::Unload => "unload",
        };
        f.write_str(phase)
    }
}

/// Failure reported by a lifecycle function or the module loader.
///
/// Clonable so one failure can settle every caller sharing an unload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("application '{app}' failed to {phase}: {message}")]
pub struct LifecycleError {
    pub app: String,
    pub phase: LifecyclePhase,
    pub message: String,
}

impl LifecycleError {
    pub fn new(app: impl Into<String>, phase: LifecyclePhase, message: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            phase,
            message: message.into(),
        }
    }
}
