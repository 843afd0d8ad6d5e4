//! Lifecycle coordination subsystem.
//!
//! # Data Flow
//! ```text
//! Start (start.rs):
//!     start() → started flag → recomputation posted
//!
//! Unload (unload.rs):
//!     request → waiter table → [teardown: unmount → unload] → settle → post
//!
//! Reroute (reroute.rs):
//!     post → queue → yield → fold pending requests → driver.reroute(pass)
//!
//! Shutdown (shutdown.rs):
//!     trigger → reroute loop and watchdog exit
//! ```
//!
//! # Design Decisions
//! - Lifecycle functions are executed by a [`LifecycleDriver`]; this module
//!   only decides which step is admissible
//! - Settlements resolve before the pass they cause runs

pub mod driver;
pub mod reroute;
pub mod settlement;
pub mod shutdown;
pub mod start;
pub mod unload;

pub use driver::LifecycleDriver;
pub use reroute::{RecomputePass, RerouteLoop, RerouteQueue, RerouteReason};
pub use settlement::{SettleResult, Settlement, Settler};
pub use shutdown::Shutdown;
pub use start::{NavigationSource, StartOptions, StartWatchdog};
pub use unload::{PendingUnload, UnloadOptions, UnloadTable};
