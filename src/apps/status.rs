//! Application lifecycle state machine.
//!
//! # States
//! - NotLoaded: registered, code not fetched yet
//! - LoadingSourceCode → NotBootstrapped → Bootstrapping → NotMounted
//! - Mounting → Mounted ⇄ Updating
//! - Unmounting → NotMounted, Unloading → NotLoaded
//! - LoadError: fetch failed, retried after a cooldown
//! - SkipBecauseBroken: never offered again until explicitly unloaded
//!
//! # State Transitions
//! ```text
//! NotLoaded         → LoadingSourceCode
//! LoadingSourceCode → NotBootstrapped | LoadError | SkipBecauseBroken
//! LoadError         → LoadingSourceCode | NotLoaded
//! NotBootstrapped   → Bootstrapping | Unloading
//! Bootstrapping     → NotMounted | SkipBecauseBroken
//! NotMounted        → Mounting | Unloading
//! Mounting          → Mounted | SkipBecauseBroken
//! Mounted           → Unmounting | Updating
//! Updating          → Mounted | SkipBecauseBroken
//! Unmounting        → NotMounted | SkipBecauseBroken
//! Unloading         → NotLoaded | SkipBecauseBroken
//! SkipBecauseBroken → NotLoaded
//! ```
//!
//! # Design Decisions
//! - The table only decides admissibility; the external scheduler drives it
//! - Every `*ING` status means a lifecycle action is in flight

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    #[default]
    NotLoaded,
    LoadingSourceCode,
    NotBootstrapped,
    Bootstrapping,
    NotMounted,
    Mounting,
    Mounted,
    Updating,
    Unmounting,
    Unloading,
    LoadError,
    SkipBecauseBroken,
}

impl AppStatus {
    pub const ALL: [AppStatus; 12] = [
        AppStatus::NotLoaded,
        AppStatus::LoadingSourceCode,
        AppStatus::NotBootstrapped,
        AppStatus::Bootstrapping,
        AppStatus::NotMounted,
        AppStatus::Mounting,
        AppStatus::Mounted,
        AppStatus::Updating,
        AppStatus::Unmounting,
        AppStatus::Unloading,
        AppStatus::LoadError,
        AppStatus::SkipBecauseBroken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::NotLoaded => "NOT_LOADED",
            AppStatus::LoadingSourceCode => "LOADING_SOURCE_CODE",
            AppStatus::NotBootstrapped => "NOT_BOOTSTRAPPED",
            AppStatus::Bootstrapping => "BOOTSTRAPPING",
            AppStatus::NotMounted => "NOT_MOUNTED",
            AppStatus::Mounting => "MOUNTING",
            AppStatus::Mounted => "MOUNTED",
            AppStatus::Updating => "UPDATING",
            AppStatus::Unmounting => "UNMOUNTING",
            AppStatus::Unloading => "UNLOADING",
            AppStatus::LoadError => "LOAD_ERROR",
            AppStatus::SkipBecauseBroken => "SKIP_BECAUSE_BROKEN",
        }
    }

    /// True while a lifecycle action is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            AppStatus::LoadingSourceCode
                | AppStatus::Bootstrapping
                | AppStatus::Mounting
                | AppStatus::Updating
                | AppStatus::Unmounting
                | AppStatus::Unloading
        )
    }

    pub fn is_mounted(&self) -> bool {
        *self == AppStatus::Mounted
    }

    pub fn is_broken(&self) -> bool {
        *self == AppStatus::SkipBecauseBroken
    }

    /// Whether the state machine admits `self → next`.
    pub fn can_transition_to(&self, next: AppStatus) -> bool {
        use AppStatus::*;

        matches!(
            (*self, next),
            (NotLoaded, LoadingSourceCode)
                | (LoadingSourceCode, NotBootstrapped | LoadError | SkipBecauseBroken)
                | (LoadError, LoadingSourceCode | NotLoaded)
                | (NotBootstrapped, Bootstrapping | Unloading)
                | (Bootstrapping, NotMounted | SkipBecauseBroken)
                | (NotMounted, Mounting | Unloading)
                | (Mounting, Mounted | SkipBecauseBroken)
                | (Mounted, Unmounting | Updating)
                | (Updating, Mounted | SkipBecauseBroken)
                | (Unmounting, NotMounted | SkipBecauseBroken)
                | (Unloading, NotLoaded | SkipBecauseBroken)
                | (SkipBecauseBroken, NotLoaded)
        )
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
