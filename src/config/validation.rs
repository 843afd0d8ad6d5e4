//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every declared application record
//! - Detect duplicate application names before registration
//! - Validate value ranges and the log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::apps::errors::OrchestratorError;
use crate::apps::manifest::AppManifest;
use crate::config::schema::OrchestratorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("apps[{index}]: {error}")]
    InvalidApp {
        index: usize,
        #[source]
        error: OrchestratorError,
    },

    #[error("apps[{index}]: application '{name}' is declared more than once")]
    DuplicateApp { index: usize, name: String },

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),

    #[error("orchestrator.start_warning_ms: must be greater than zero")]
    ZeroStartWarning,
}

pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, record) in config.apps.iter().enumerate() {
        match AppManifest::from_record(record) {
            Ok(manifest) => {
                if !seen.insert(manifest.name.clone()) {
                    errors.push(ValidationError::DuplicateApp {
                        index,
                        name: manifest.name,
                    });
                }
            }
            Err(error) => errors.push(ValidationError::InvalidApp { index, error }),
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.orchestrator.start_warning_ms == 0 {
        errors.push(ValidationError::ZeroStartWarning);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
