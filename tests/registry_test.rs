//! Registration, manifest and lookup tests.

use std::sync::{Arc, Mutex};

use serde_json::json;

use spa_orchestrator::apps::{
    loader_fn, AppLoader, ErrorKind, Lifecycles, ModuleResolver, RegisterArgs,
};
use spa_orchestrator::config::parse_config;
use spa_orchestrator::routing::ActiveWhenRule;
use spa_orchestrator::{ActiveWhen, AppManifest, AppSource, AppStatus, Location};

mod common;

use common::{app, loc, Fixture, NoopApp};

/// Resolver remembering every specifier it was asked for.
#[derive(Default)]
struct RecordingResolver {
    specifiers: Mutex<Vec<String>>,
}

impl ModuleResolver for RecordingResolver {
    fn resolve(&self, specifier: &str) -> Arc<dyn AppLoader> {
        self.specifiers.lock().unwrap().push(specifier.to_string());
        loader_fn(|_props| async { Ok(Arc::new(NoopApp) as Arc<dyn Lifecycles>) })
    }
}

#[tokio::test]
async fn test_both_registration_shapes() {
    let fx = Fixture::new();
    fx.orchestrator
        .register_application(RegisterArgs::Positional {
            name: "positional".into(),
            app: AppSource::Value(Arc::new(NoopApp)),
            active_when: ActiveWhen::path("/p"),
            custom_props: None,
        })
        .unwrap();
    fx.orchestrator.register(app("config", "/c")).unwrap();

    assert_eq!(fx.orchestrator.app_names(), vec!["positional", "config"]);
    assert_eq!(fx.orchestrator.app_status("config"), Some(AppStatus::NotLoaded));
}

#[tokio::test]
async fn test_registration_errors() {
    let fx = Fixture::new();
    fx.orchestrator.register(app("a", "/a")).unwrap();

    let err = fx.orchestrator.register(app("a", "/b")).unwrap_err();
    assert_eq!(err.code(), 21);
    assert_eq!(err.kind(), ErrorKind::DuplicateName);
    assert!(err.to_string().starts_with("#21:"));

    let err = fx.orchestrator.register(app("", "/b")).unwrap_err();
    assert_eq!(err.code(), 20);

    assert_eq!(fx.orchestrator.app_names(), vec!["a"]);
}

#[tokio::test]
async fn test_activation_rules() {
    let fx = Fixture::new();
    fx.orchestrator.register(app("list", vec!["/one", "/two/:id"])).unwrap();
    fx.orchestrator
        .register(app(
            "mixed",
            ActiveWhen::Any(vec![
                ActiveWhenRule::Path("/three".into()),
                ActiveWhenRule::Predicate(Arc::new(|l: &Location| l.url().query() == Some("debug"))),
            ]),
        ))
        .unwrap();
    fx.orchestrator
        .register(app("hash", "/#/reports"))
        .unwrap();

    assert_eq!(fx.orchestrator.active_app_names(&loc("https://host/two/7")), vec!["list"]);
    assert!(fx.orchestrator.active_app_names(&loc("https://host/two")).is_empty());
    assert_eq!(fx.orchestrator.active_app_names(&loc("https://host/x?debug")), vec!["mixed"]);
    assert_eq!(fx.orchestrator.active_app_names(&loc("https://host/THREE")), vec!["mixed"]);
    assert_eq!(
        fx.orchestrator.active_app_names(&loc("https://host/#/reports/2024?x=1")),
        vec!["hash"]
    );
}

#[tokio::test]
async fn test_manifest_records() {
    let fx = Fixture::new();
    let resolver = RecordingResolver::default();

    let manifest = AppManifest::from_value(&json!({
        "name": "settings",
        "app": "@org/settings",
        "activeWhen": ["/settings", "/profile/:id"],
        "customProps": { "theme": "dark" },
    }))
    .unwrap();
    fx.orchestrator.register_manifest(manifest, &resolver).unwrap();

    assert_eq!(*resolver.specifiers.lock().unwrap(), vec!["@org/settings"]);
    assert_eq!(
        fx.orchestrator.active_app_names(&loc("https://host/profile/3")),
        vec!["settings"]
    );

    let snapshot = serde_json::to_value(fx.orchestrator.snapshot()).unwrap();
    assert_eq!(snapshot[0]["status"], "NOT_LOADED");
    assert_eq!(snapshot[0]["custom_props"]["theme"], "dark");
    assert_eq!(snapshot[0]["unload_pending"], false);
}

#[test]
fn test_manifest_validation_codes() {
    let cases = [
        (json!(["not", "a", "record"]), 39),
        (json!(null), 39),
        (json!({ "name": "a", "app": "m", "activeWhen": "/", "extra": true }), 38),
        (json!({ "app": "m", "activeWhen": "/" }), 20),
        (json!({ "name": "a", "activeWhen": "/" }), 23),
        (json!({ "name": "a", "app": 3, "activeWhen": "/" }), 20),
        (json!({ "name": "a", "app": "m", "activeWhen": 5 }), 24),
        (json!({ "name": "a", "app": "m", "activeWhen": "/", "customProps": [1] }), 22),
        (json!({ "name": "a", "app": "m", "activeWhen": "/", "customProps": "x" }), 22),
    ];

    for (value, code) in cases {
        let err = AppManifest::from_value(&value).unwrap_err();
        assert_eq!(err.code(), code, "{}", value);
    }
}

#[tokio::test]
async fn test_config_manifest_registers_in_order() {
    let config = parse_config(
        r#"
        [orchestrator]
        reroute_on_register = false

        [[apps]]
        name = "nav"
        app = "@org/nav"
        activeWhen = "/"

        [[apps]]
        name = "billing"
        app = "@org/billing"
        activeWhen = "/billing"
        "#,
    )
    .unwrap();

    let fx = Fixture::with_config(config.orchestrator.clone());
    let resolver = RecordingResolver::default();
    for manifest in config.manifests().unwrap() {
        fx.orchestrator.register_manifest(manifest, &resolver).unwrap();
    }

    assert_eq!(fx.orchestrator.app_names(), vec!["nav", "billing"]);
    assert_eq!(
        fx.orchestrator.active_app_names(&loc("https://host/billing/invoices")),
        vec!["nav", "billing"]
    );
}
