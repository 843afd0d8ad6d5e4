//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::apps::errors::OrchestratorError;
use crate::apps::manifest::AppManifest;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Core orchestrator behavior.
    pub orchestrator: CoreConfig,

    /// Start behavior.
    pub start: StartConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Applications declared in the manifest. Kept as untyped records and
    /// validated key by key.
    pub apps: Vec<Map<String, Value>>,
}

impl OrchestratorConfig {
    /// Validate every declared application, in declaration order.
    pub fn manifests(&self) -> Result<Vec<AppManifest>, OrchestratorError> {
        self.apps.iter().map(AppManifest::from_record).collect()
    }
}

/// Core orchestrator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Post a recomputation pass after every registration.
    pub reroute_on_register: bool,

    /// Minimum delay before an application in `LOAD_ERROR` is retried.
    pub load_retry_cooldown_ms: u64,

    /// Grace period before warning that `start` was never called.
    pub start_warning_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reroute_on_register: true,
            load_retry_cooldown_ms: 200,
            start_warning_ms: 5000,
        }
    }
}

impl CoreConfig {
    pub fn load_retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.load_retry_cooldown_ms)
    }

    pub fn start_warning(&self) -> Duration {
        Duration::from_millis(self.start_warning_ms)
    }
}

/// Start settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StartConfig {
    /// Call `start` right after the manifest is registered.
    pub auto_start: bool,

    /// Only recompute on history-API navigations that change the route.
    pub url_reroute_only: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Record metrics through the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.orchestrator.reroute_on_register);
        assert_eq!(config.orchestrator.load_retry_cooldown(), Duration::from_millis(200));
        assert_eq!(config.orchestrator.start_warning(), Duration::from_millis(5000));
        assert!(!config.start.auto_start);
        assert_eq!(config.observability.log_level, "info");
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_apps_parse_from_toml() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [orchestrator]
            load_retry_cooldown_ms = 50

            [[apps]]
            name = "nav"
            app = "@org/nav"
            activeWhen = "/"

            [[apps]]
            name = "settings"
            app = "@org/settings"
            activeWhen = ["/settings", "/profile/:id"]
            customProps = { theme = "dark" }
            "#,
        )
        .unwrap();

        assert_eq!(config.orchestrator.load_retry_cooldown_ms, 50);
        assert!(config.orchestrator.reroute_on_register);

        let manifests = config.manifests().unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[1].name, "settings");
        assert_eq!(manifests[1].module, "@org/settings");
    }
}
