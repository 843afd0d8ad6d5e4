//! The scheduler seam.
//!
//! The orchestrator decides which lifecycle step is admissible; a
//! [`LifecycleDriver`] executes it. Hosts implement this trait on top of their
//! own module runtime.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::apps::registration::{LifecycleFuture, Registration};
use crate::lifecycle::reroute::RecomputePass;

/// External scheduler executing lifecycle functions.
pub trait LifecycleDriver: Send + Sync + 'static {
    /// Run the application's unmount lifecycle.
    fn unmount(&self, app: Arc<Registration>) -> LifecycleFuture;

    /// Run the application's unload lifecycle.
    fn unload(&self, app: Arc<Registration>) -> LifecycleFuture;

    /// Recompute the change set and execute it. Passes never overlap.
    fn reroute(&self, pass: RecomputePass) -> BoxFuture<'static, ()>;
}
