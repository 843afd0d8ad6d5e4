//! Change-set calculation.
//!
//! # Responsibilities
//! - Diff "what should be active" against "what is active"
//! - Partition applications into load / unload / mount / unmount work lists
//! - Apply the load-error retry cooldown
//!
//! # Design Decisions
//! - Pure: reads a registry snapshot, a location and a clock reading only
//! - Broken and in-flight (`*ING`) applications are never offered, which keeps
//!   at most one lifecycle action in flight per application. The one exception
//!   is an in-flight load, re-offered so the scheduler can join it
//! - Applications with an immediate teardown in flight are left to the unload
//!   coordinator
//! - Lists preserve registration order

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::apps::registry::Application;
use crate::apps::status::AppStatus;
use crate::lifecycle::unload::PendingUnload;
use crate::routing::Location;

/// Minimum delay before an application in `LoadError` is offered again.
pub const DEFAULT_LOAD_RETRY_COOLDOWN: Duration = Duration::from_millis(200);

/// Work lists consumed by the external scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub to_unload: Vec<String>,
    pub to_unmount: Vec<String>,
    pub to_load: Vec<String>,
    pub to_mount: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.to_unload.len() + self.to_unmount.len() + self.to_load.len() + self.to_mount.len()
    }

    /// Before `start`, applications may load but not bootstrap or mount.
    pub fn before_start(self) -> Self {
        Self {
            to_load: self.to_load,
            ..Self::default()
        }
    }

    /// Every name in the change set, in list order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.to_unload
            .iter()
            .chain(&self.to_unmount)
            .chain(&self.to_load)
            .chain(&self.to_mount)
            .map(String::as_str)
    }
}

/// Compute the change set for `location`.
///
/// `pending` reports the unload waiter state of a name, if any.
pub fn calculate_changes<'a, I, F>(
    apps: I,
    location: &Location,
    now: Instant,
    cooldown: Duration,
    pending: F,
) -> ChangeSet
where
    I: IntoIterator<Item = &'a Application>,
    F: Fn(&str) -> Option<PendingUnload>,
{
    let mut changes = ChangeSet::default();

    for app in apps {
        let name = app.name();
        let waiter = pending(name);
        if waiter == Some(PendingUnload::Tearing) {
            continue;
        }

        let should_be_active = app.should_be_active(location);

        match app.status() {
            AppStatus::LoadError => {
                let cooled_down = app
                    .load_error_time()
                    .map(|at| now.saturating_duration_since(at) >= cooldown)
                    .unwrap_or(true);
                if should_be_active && cooled_down {
                    changes.to_load.push(name.to_string());
                }
            }
            AppStatus::NotLoaded | AppStatus::LoadingSourceCode => {
                if should_be_active {
                    changes.to_load.push(name.to_string());
                }
            }
            AppStatus::NotBootstrapped | AppStatus::NotMounted => {
                if !should_be_active && waiter == Some(PendingUnload::Waiting) {
                    changes.to_unload.push(name.to_string());
                } else if should_be_active {
                    changes.to_mount.push(name.to_string());
                }
            }
            AppStatus::Mounted => {
                if !should_be_active {
                    changes.to_unmount.push(name.to_string());
                }
            }
            _ => {}
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::registry::tests::registration;
    use crate::apps::registry::AppRegistry;
    use std::collections::HashSet;

    fn loc(href: &str) -> Location {
        Location::parse(href).unwrap()
    }

    fn drive(registry: &mut AppRegistry, name: &str, path: &[AppStatus], now: Instant) {
        for status in path {
            registry.transition(name, *status, now).unwrap();
        }
    }

    const TO_NOT_MOUNTED: [AppStatus; 4] = [
        AppStatus::LoadingSourceCode,
        AppStatus::NotBootstrapped,
        AppStatus::Bootstrapping,
        AppStatus::NotMounted,
    ];

    fn none(_: &str) -> Option<PendingUnload> {
        None
    }

    #[test]
    fn test_not_loaded_active_is_loaded() {
        let mut registry = AppRegistry::new();
        registry.insert(registration("a", "/a")).unwrap();
        registry.insert(registration("b", "/b")).unwrap();

        let changes = calculate_changes(
            registry.iter(),
            &loc("https://host/a"),
            Instant::now(),
            DEFAULT_LOAD_RETRY_COOLDOWN,
            none,
        );
        assert_eq!(changes.to_load, vec!["a"]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_mount_and_unmount() {
        let now = Instant::now();
        let mut registry = AppRegistry::new();
        registry.insert(registration("a", "/a")).unwrap();
        registry.insert(registration("b", "/b")).unwrap();
        drive(&mut registry, "a", &TO_NOT_MOUNTED, now);
        drive(&mut registry, "b", &TO_NOT_MOUNTED, now);
        drive(&mut registry, "b", &[AppStatus::Mounting, AppStatus::Mounted], now);

        let changes = calculate_changes(
            registry.iter(),
            &loc("https://host/a"),
            now,
            DEFAULT_LOAD_RETRY_COOLDOWN,
            none,
        );
        assert_eq!(changes.to_mount, vec!["a"]);
        assert_eq!(changes.to_unmount, vec!["b"]);
        assert!(changes.to_load.is_empty());
        assert!(changes.to_unload.is_empty());
    }

    #[test]
    fn test_load_error_cooldown() {
        let start = Instant::now();
        let mut registry = AppRegistry::new();
        registry.insert(registration("a", "/a")).unwrap();
        drive(
            &mut registry,
            "a",
            &[AppStatus::LoadingSourceCode, AppStatus::LoadError],
            start,
        );
        let location = loc("https://host/a");

        for elapsed in [0, 1, 100, 199] {
            let changes = calculate_changes(
                registry.iter(),
                &location,
                start + Duration::from_millis(elapsed),
                DEFAULT_LOAD_RETRY_COOLDOWN,
                none,
            );
            assert!(changes.is_empty(), "offered after {}ms", elapsed);
        }

        let changes = calculate_changes(
            registry.iter(),
            &location,
            start + Duration::from_millis(200),
            DEFAULT_LOAD_RETRY_COOLDOWN,
            none,
        );
        assert_eq!(changes.to_load, vec!["a"]);
    }

    #[test]
    fn test_unload_requires_waiter() {
        let now = Instant::now();
        let mut registry = AppRegistry::new();
        registry.insert(registration("a", "/a")).unwrap();
        drive(&mut registry, "a", &TO_NOT_MOUNTED, now);
        let elsewhere = loc("https://host/elsewhere");

        let changes = calculate_changes(registry.iter(), &elsewhere, now, DEFAULT_LOAD_RETRY_COOLDOWN, none);
        assert!(changes.is_empty());

        let changes = calculate_changes(registry.iter(), &elsewhere, now, DEFAULT_LOAD_RETRY_COOLDOWN, |_: &str| {
            Some(PendingUnload::Waiting)
        });
        assert_eq!(changes.to_unload, vec!["a"]);

        let changes = calculate_changes(registry.iter(), &elsewhere, now, DEFAULT_LOAD_RETRY_COOLDOWN, |_: &str| {
            Some(PendingUnload::Tearing)
        });
        assert!(changes.is_empty());
    }

    #[test]
    fn test_waiting_app_that_is_active_mounts() {
        let now = Instant::now();
        let mut registry = AppRegistry::new();
        registry.insert(registration("a", "/a")).unwrap();
        drive(&mut registry, "a", &TO_NOT_MOUNTED, now);

        let changes = calculate_changes(
            registry.iter(),
            &loc("https://host/a"),
            now,
            DEFAULT_LOAD_RETRY_COOLDOWN,
            |_: &str| Some(PendingUnload::Waiting),
        );
        assert_eq!(changes.to_mount, vec!["a"]);
    }

    #[test]
    fn test_broken_and_transitional_excluded() {
        let now = Instant::now();
        let mut registry = AppRegistry::new();
        registry.insert(registration("broken", "/")).unwrap();
        registry.insert(registration("loading", "/")).unwrap();
        registry.insert(registration("mounting", "/")).unwrap();
        drive(
            &mut registry,
            "broken",
            &[AppStatus::LoadingSourceCode, AppStatus::SkipBecauseBroken],
            now,
        );
        drive(&mut registry, "loading", &[AppStatus::LoadingSourceCode], now);
        drive(&mut registry, "mounting", &TO_NOT_MOUNTED, now);
        drive(&mut registry, "mounting", &[AppStatus::Mounting], now);

        let changes = calculate_changes(
            registry.iter(),
            &loc("https://host/x"),
            now,
            DEFAULT_LOAD_RETRY_COOLDOWN,
            none,
        );
        // LoadingSourceCode is re-offered so the scheduler can await the
        // in-flight load rather than start a second one.
        assert_eq!(changes.to_load, vec!["loading"]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_lists_are_disjoint() {
        let now = Instant::now();
        let mut registry = AppRegistry::new();
        let paths: [(&str, &[AppStatus]); 5] = [
            ("fresh", &[]),
            ("ready", &TO_NOT_MOUNTED),
            ("failed", &[AppStatus::LoadingSourceCode, AppStatus::LoadError]),
            ("bootstrappable", &[AppStatus::LoadingSourceCode, AppStatus::NotBootstrapped]),
            (
                "shown",
                &[
                    AppStatus::LoadingSourceCode,
                    AppStatus::NotBootstrapped,
                    AppStatus::Bootstrapping,
                    AppStatus::NotMounted,
                    AppStatus::Mounting,
                    AppStatus::Mounted,
                ],
            ),
        ];
        for (name, path) in paths {
            registry.insert(registration(name, &format!("/{}", name))).unwrap();
            drive(&mut registry, name, path, now);
        }

        let hrefs = [
            "https://host/fresh",
            "https://host/ready",
            "https://host/failed",
            "https://host/shown",
            "https://host/nowhere",
        ];
        for href in hrefs {
            for waiting in [false, true] {
                let changes = calculate_changes(
                    registry.iter(),
                    &loc(href),
                    now + Duration::from_secs(1),
                    DEFAULT_LOAD_RETRY_COOLDOWN,
                    |_: &str| waiting.then_some(PendingUnload::Waiting),
                );
                let unique: HashSet<&str> = changes.names().collect();
                assert_eq!(unique.len(), changes.len(), "{} {:?}", href, changes);
            }
        }
    }

    #[test]
    fn test_before_start_keeps_loads_only() {
        let changes = ChangeSet {
            to_unload: vec!["u".into()],
            to_unmount: vec!["x".into()],
            to_load: vec!["l".into()],
            to_mount: vec!["m".into()],
        };
        let filtered = changes.before_start();
        assert_eq!(filtered.to_load, vec!["l"]);
        assert_eq!(filtered.len(), 1);
    }
}
