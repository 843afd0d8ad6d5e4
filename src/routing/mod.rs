//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (once):
//!     activeWhen (pattern | predicate | list of both)
//!     → active_when.rs (normalize)
//!     → pattern.rs (compile patterns to anchored regexes)
//!     → one OR-combined Matcher stored on the registration
//!
//! Every navigation:
//!     Location (location.rs: origin and query stripped)
//!     → Matcher::matches
//!     → active / inactive
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at registration, immutable afterwards
//! - Deterministic: same location always yields the same answer
//! - Predicates never fail; a malformed pattern is rejected at registration

pub mod active_when;
pub mod location;
pub mod pattern;

pub use active_when::{ActiveWhen, ActiveWhenRule, ActivityFn};
pub use location::Location;
pub use pattern::{AnyMatcher, Matcher, PathPattern};
