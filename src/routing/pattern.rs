//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile a declarative path pattern (`/users/:id`) into a predicate
//! - Match the path and fragment of a location, ignoring origin and query
//! - Combine several matchers with OR semantics
//!
//! # Design Decisions
//! - Patterns are compiled once at registration, never on the hot path
//! - Matching is case-insensitive and anchored at the start of the route
//! - A pattern that ends on a literal matches as a prefix boundary: the route
//!   may continue with `/` or `#`, but not with more characters of a segment
//! - Dynamic segments match one or more non-slash characters

use regex::{Regex, RegexBuilder};

use crate::apps::errors::OrchestratorError;
use crate::routing::location::Location;

/// Wildcard for a dynamic segment, with an optional trailing slash.
const DYNAMIC_SEGMENT: &str = "[^/]+/?";

/// Trait for deciding whether a location activates an application.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the location matches this condition.
    fn matches(&self, location: &Location) -> bool;
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile `pattern` into an anchored, case-insensitive matcher.
    pub fn compile(pattern: &str) -> Result<Self, OrchestratorError> {
        let source = to_regex_source(pattern);
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| OrchestratorError::InvalidActiveWhen(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written by the caller.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    /// Test a bare route (path plus optional fragment).
    pub fn matches_route(&self, route: &str) -> bool {
        self.regex.is_match(route)
    }
}

impl Matcher for PathPattern {
    fn matches(&self, location: &Location) -> bool {
        self.matches_route(&location.route())
    }
}

/// Build the regex source for a path pattern in a single scan.
fn to_regex_source(pattern: &str) -> String {
    let path = if pattern.starts_with('/') {
        pattern.to_string()
    } else {
        format!("/{}", pattern)
    };

    let mut source = String::from("^");
    let mut in_dynamic = false;
    let mut last_index = 0;

    for (index, ch) in path.char_indices() {
        let starts_dynamic = !in_dynamic && ch == ':';
        let ends_dynamic = in_dynamic && ch == '/';
        if starts_dynamic || ends_dynamic {
            append_run(&mut source, &path[last_index..index], in_dynamic);
            in_dynamic = !in_dynamic;
            last_index = index;
        }
    }
    append_run(&mut source, &path[last_index..], in_dynamic);

    if !in_dynamic {
        if source.ends_with('/') {
            source.push_str(".*$");
        } else {
            source.push_str("([/#].*)?$");
        }
    }
    source
}

fn append_run(source: &mut String, run: &str, dynamic: bool) {
    if dynamic {
        source.push_str(DYNAMIC_SEGMENT);
    } else {
        source.push_str(&regex::escape(run));
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, location: &Location) -> bool {
        self.matchers.iter().any(|m| m.matches(location))
    }
}
