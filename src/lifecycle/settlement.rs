//! Shared settlement futures.
//!
//! A [`Settlement`] is the handle every caller of an unload receives. All
//! clones resolve together, exactly once, when the matching [`Settler`] is
//! used. Settling happens synchronously; the wakeups it causes run before any
//! work posted to the reroute queue afterwards.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::apps::errors::{LifecycleError, LifecyclePhase};

pub type SettleResult = Result<(), LifecycleError>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Clonable future resolving once its [`Settler`] settles it.
#[derive(Clone)]
pub struct Settlement {
    id: u64,
    inner: Shared<BoxFuture<'static, SettleResult>>,
}

/// Resolves or rejects the matching [`Settlement`].
#[derive(Debug)]
pub struct Settler {
    tx: oneshot::Sender<SettleResult>,
}

impl Settlement {
    /// Create a settlement for `app`. If the settler is dropped unused, the
    /// settlement rejects instead of hanging.
    pub fn new(app: &str) -> (Settler, Settlement) {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let app = app.to_string();

        let inner = rx
            .map(move |received| {
                received.unwrap_or_else(|_| {
                    Err(LifecycleError::new(app, LifecyclePhase::Unload, "teardown was abandoned"))
                })
            })
            .boxed()
            .shared();

        (Settler { tx }, Settlement { id, inner })
    }

    /// True when both handles were produced by the same request.
    pub fn same_as(&self, other: &Settlement) -> bool {
        self.id == other.id
    }

    /// The outcome, if already settled and observed.
    pub fn peek(&self) -> Option<&SettleResult> {
        self.inner.peek()
    }
}

impl Future for Settlement {
    type Output = SettleResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("id", &self.id)
            .field("settled", &self.peek().is_some())
            .finish()
    }
}

impl Settler {
    pub fn settle(self, result: SettleResult) {
        // Every handle may already be gone; nobody is left to tell.
        let _ = self.tx.send(result);
    }

    pub fn resolve(self) {
        self.settle(Ok(()))
    }

    pub fn reject(self, error: LifecycleError) {
        self.settle(Err(error))
    }
}
