//! Activation rules.
//!
//! An application may be activated by a path pattern, a predicate, or a list
//! mixing both. Whatever the input, it is normalized into one [`Matcher`]
//! before the application enters the registry.

use std::sync::Arc;

use serde_json::Value;

use crate::apps::errors::OrchestratorError;
use crate::routing::location::Location;
use crate::routing::pattern::{AnyMatcher, Matcher, PathPattern};

/// Predicate over the current location.
///
/// Predicates run while the orchestrator's state lock is held, so they must
/// not call back into the [`Orchestrator`](crate::Orchestrator).
pub type ActivityFn = Arc<dyn Fn(&Location) -> bool + Send + Sync>;

/// One entry of an activation list.
#[derive(Clone)]
pub enum ActiveWhenRule {
    Path(String),
    Predicate(ActivityFn),
}

/// Activation rule as supplied at registration.
#[derive(Clone)]
pub enum ActiveWhen {
    Path(String),
    Predicate(ActivityFn),
    Any(Vec<ActiveWhenRule>),
}

impl ActiveWhen {
    pub fn path(pattern: impl Into<String>) -> Self {
        ActiveWhen::Path(pattern.into())
    }

    /// Activate on a custom check. See [`ActivityFn`].
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Location) -> bool + Send + Sync + 'static,
    {
        ActiveWhen::Predicate(Arc::new(f))
    }

    /// Parse the untyped form used by manifests: a string or an array of
    /// strings.
    pub fn from_value(value: &Value) -> Result<Self, OrchestratorError> {
        match value {
            Value::String(pattern) => Ok(ActiveWhen::Path(pattern.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(pattern) => Ok(ActiveWhenRule::Path(pattern.clone())),
                    other => Err(OrchestratorError::InvalidActiveWhen(format!(
                        "unexpected list entry {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ActiveWhen::Any),
            Value::Null => Err(OrchestratorError::InvalidActiveWhen("missing".into())),
            other => Err(OrchestratorError::InvalidActiveWhen(format!(
                "unexpected value {}",
                other
            ))),
        }
    }

    /// Compile path patterns and fold the rule into a single matcher.
    pub fn into_matcher(self) -> Result<Arc<dyn Matcher>, OrchestratorError> {
        let rules = match self {
            ActiveWhen::Path(pattern) => vec![ActiveWhenRule::Path(pattern)],
            ActiveWhen::Predicate(f) => vec![ActiveWhenRule::Predicate(f)],
            ActiveWhen::Any(rules) => rules,
        };

        let matchers = rules
            .into_iter()
            .map(|rule| -> Result<Box<dyn Matcher>, OrchestratorError> {
                match rule {
                    ActiveWhenRule::Path(pattern) => Ok(Box::new(PathPattern::compile(&pattern)?)),
                    ActiveWhenRule::Predicate(f) => Ok(Box::new(PredicateMatcher(f))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(AnyMatcher::new(matchers)))
    }
}

impl std::fmt::Debug for ActiveWhen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveWhen::Path(p) => f.debug_tuple("Path").field(p).finish(),
            ActiveWhen::Predicate(_) => f.write_str("Predicate(..)"),
            ActiveWhen::Any(rules) => f.debug_tuple("Any").field(&rules.len()).finish(),
        }
    }
}

impl From<&str> for ActiveWhen {
    fn from(pattern: &str) -> Self {
        ActiveWhen::Path(pattern.to_string())
    }
}

impl From<Vec<&str>> for ActiveWhen {
    fn from(patterns: Vec<&str>) -> Self {
        ActiveWhen::Any(
            patterns
                .into_iter()
                .map(|p| ActiveWhenRule::Path(p.to_string()))
                .collect(),
        )
    }
}

/// Wraps a caller-supplied predicate.
struct PredicateMatcher(ActivityFn);

impl std::fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PredicateMatcher")
    }
}

impl Matcher for PredicateMatcher {
    fn matches(&self, location: &Location) -> bool {
        (self.0)(location)
    }
}
