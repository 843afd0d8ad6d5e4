//! Untyped registration records.
//!
//! Manifests (config files, JSON payloads) describe applications as loose
//! key/value records. They are checked here, key by key, before being turned
//! into an [`AppConfig`]. The `app` entry is a module specifier that a
//! [`ModuleResolver`] maps onto a loader.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::apps::errors::{OrchestratorError, VALID_CONFIG_KEYS};
use crate::apps::registration::{AppConfig, AppLoader, AppSource, CustomProps};
use crate::routing::ActiveWhen;

/// Maps a module specifier onto the loader that fetches it.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, specifier: &str) -> Arc<dyn AppLoader>;
}

/// A validated manifest entry.
#[derive(Clone, Serialize)]
pub struct AppManifest {
    pub name: String,
    pub module: String,
    #[serde(skip)]
    pub active_when: ActiveWhen,
    #[serde(skip)]
    pub custom_props: Option<CustomProps>,
}

impl AppManifest {
    pub fn from_value(value: &Value) -> Result<Self, OrchestratorError> {
        match value {
            Value::Object(record) => Self::from_record(record),
            _ => Err(OrchestratorError::InvalidConfigShape),
        }
    }

    /// Validate a record holding exactly the keys
    /// `name`, `app`, `activeWhen` and `customProps`.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, OrchestratorError> {
        let invalid: Vec<String> = record
            .keys()
            .filter(|key| !VALID_CONFIG_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !invalid.is_empty() {
            return Err(OrchestratorError::InvalidConfigKeys { invalid });
        }

        let name = match record.get("name") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => return Err(OrchestratorError::InvalidName),
        };

        let module = match record.get("app") {
            Some(Value::String(specifier)) if !specifier.is_empty() => specifier.clone(),
            None | Some(Value::Null) => {
                return Err(OrchestratorError::InvalidApp {
                    code: 23,
                    reason: format!("app '{}' has no module to load", name),
                })
            }
            Some(_) => {
                return Err(OrchestratorError::InvalidApp {
                    code: 20,
                    reason: format!("app '{}' must name a module specifier", name),
                })
            }
        };

        let active_when = ActiveWhen::from_value(record.get("activeWhen").unwrap_or(&Value::Null))?;
        let custom_props = match record.get("customProps") {
            Some(value) => CustomProps::from_value(value)?,
            None => None,
        };

        Ok(Self {
            name,
            module,
            active_when,
            custom_props,
        })
    }

    pub fn into_config(self, resolver: &dyn ModuleResolver) -> AppConfig {
        AppConfig {
            app: AppSource::Loader(resolver.resolve(&self.module)),
            name: self.name,
            active_when: self.active_when,
            custom_props: self.custom_props,
        }
    }
}

impl std::fmt::Debug for AppManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppManifest")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("active_when", &self.active_when)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_record() {
        let manifest = AppManifest::from_value(&json!({
            "name": "nav",
            "app": "https://cdn.example/nav.js",
            "activeWhen": ["/settings/:tab", "/profile"],
            "customProps": { "theme": "dark" }
        }))
        .unwrap();

        assert_eq!(manifest.name, "nav");
        assert_eq!(manifest.module, "https://cdn.example/nav.js");
        assert!(manifest.custom_props.is_some());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = AppManifest::from_value(&json!({
            "name": "nav",
            "app": "nav.js",
            "activeWhen": "/",
            "route": "/x",
            "props": {}
        }))
        .unwrap_err();

        assert_eq!(err.code(), 38);
        match err {
            OrchestratorError::InvalidConfigKeys { invalid } => {
                assert_eq!(invalid.len(), 2);
                assert!(invalid.contains(&"route".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(AppManifest::from_value(&json!([1])).unwrap_err().code(), 39);
        assert_eq!(AppManifest::from_value(&Value::Null).unwrap_err().code(), 39);
        assert_eq!(
            AppManifest::from_value(&json!({"name": "", "app": "a", "activeWhen": "/"}))
                .unwrap_err()
                .code(),
            20
        );
        assert_eq!(
            AppManifest::from_value(&json!({"name": "a", "activeWhen": "/"}))
                .unwrap_err()
                .code(),
            23
        );
        assert_eq!(
            AppManifest::from_value(&json!({"name": "a", "app": 5, "activeWhen": "/"}))
                .unwrap_err()
                .code(),
            20
        );
        assert_eq!(
            AppManifest::from_value(&json!({"name": "a", "app": "a.js"}))
                .unwrap_err()
                .code(),
            24
        );
        assert_eq!(
            AppManifest::from_value(&json!({
                "name": "a", "app": "a.js", "activeWhen": "/", "customProps": [1]
            }))
            .unwrap_err()
            .code(),
            22
        );
    }

    #[test]
    fn test_null_custom_props_is_omitted() {
        let manifest = AppManifest::from_value(&json!({
            "name": "a", "app": "a.js", "activeWhen": "/", "customProps": null
        }))
        .unwrap();
        assert!(manifest.custom_props.is_none());
    }
}
