//! Core matching traits and helpers.
//!
//! This module provides:
//! - `MatchResult` - pass/fail outcome with human-readable explanations
//! - `Matcher` - the predicate trait every matcher family implements
//! - `CachedValue` - an expected string with pre-computed lowercase
//! - `StringMatchCore` - the string operations shared by path, body and header matchers

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Outcome of testing a single matcher against a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    passed: bool,
    failure_message: String,
    negated_failure_message: String,
}

impl MatchResult {
    pub fn new(
        passed: bool,
        failure_message: impl Into<String>,
        negated_failure_message: impl Into<String>,
    ) -> Self {
        Self {
            passed,
            failure_message: failure_message.into(),
            negated_failure_message: negated_failure_message.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Explains why the value did not satisfy the matcher.
    pub fn failure_message(&self) -> &str {
        &self.failure_message
    }

    /// Explains why the value unexpectedly satisfied the matcher.
    pub fn negated_failure_message(&self) -> &str {
        &self.negated_failure_message
    }

    /// Invert the result, swapping the two messages.
    pub fn negate(self) -> Self {
        Self {
            passed: !self.passed,
            failure_message: self.negated_failure_message,
            negated_failure_message: self.failure_message,
        }
    }
}

/// A stateless predicate over `T` with diagnostics.
///
/// Matchers are built once when a mapping is registered and shared between
/// concurrent requests, hence the `Send + Sync` bound.
pub trait Matcher<T: ?Sized>: Send + Sync {
    fn test(&self, value: &T) -> MatchResult;

    /// Short description used in logs and 404 diagnostics.
    fn describe(&self) -> String;
}

impl<T: ?Sized> fmt::Debug for dyn Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Shared, type-erased matcher.
pub type SharedMatcher<T> = Arc<dyn Matcher<T>>;

/// Matcher backed by a closure.
pub struct PredicateMatcher<F> {
    description: String,
    predicate: F,
}

impl<T, F> Matcher<T> for PredicateMatcher<F>
where
    T: ?Sized + fmt::Debug,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn test(&self, value: &T) -> MatchResult {
        let passed = (self.predicate)(value);
        MatchResult::new(
            passed,
            format!("{value:?} should match predicate '{}'", self.description),
            format!("{value:?} should NOT match predicate '{}'", self.description),
        )
    }

    fn describe(&self) -> String {
        format!("predicate '{}'", self.description)
    }
}

/// Build a matcher from a free-form predicate.
pub fn predicate<T, F>(description: impl Into<String>, predicate: F) -> SharedMatcher<T>
where
    T: ?Sized + fmt::Debug + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Arc::new(PredicateMatcher {
        description: description.into(),
        predicate,
    })
}

/// A string value with pre-computed lowercase for efficient case-insensitive matching.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    /// Original value (for case-sensitive matching)
    pub value: String,
    /// Pre-computed lowercase (for case-insensitive matching)
    pub lower: String,
}

impl CachedValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let lower = value.to_lowercase();
        Self { value, lower }
    }

    #[inline]
    pub fn equals(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value == self.value
        } else {
            value.to_lowercase() == self.lower
        }
    }

    #[inline]
    pub fn contained_in(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.contains(&self.value)
        } else {
            value.to_lowercase().contains(&self.lower)
        }
    }

    #[inline]
    pub fn starts(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.starts_with(&self.value)
        } else {
            value.to_lowercase().starts_with(&self.lower)
        }
    }

    #[inline]
    pub fn ends(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.ends_with(&self.value)
        } else {
            value.to_lowercase().ends_with(&self.lower)
        }
    }
}

impl From<&str> for CachedValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CachedValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Core string matching operations.
#[derive(Debug, Clone)]
pub enum StringMatchCore {
    Equals(CachedValue),
    Contains(CachedValue),
    StartsWith(CachedValue),
    EndsWith(CachedValue),
    /// Case sensitivity lives in the pattern itself
    Regex(Arc<Regex>),
}

impl StringMatchCore {
    pub fn matches(&self, value: &str, case_sensitive: bool) -> bool {
        match self {
            Self::Equals(cached) => cached.equals(value, case_sensitive),
            Self::Contains(cached) => cached.contained_in(value, case_sensitive),
            Self::StartsWith(cached) => cached.starts(value, case_sensitive),
            Self::EndsWith(cached) => cached.ends(value, case_sensitive),
            Self::Regex(regex) => regex.is_match(value),
        }
    }

    /// Verb phrase and expected operand, e.g. `("contain", "'foo'")`.
    pub fn verb_and_operand(&self) -> (&'static str, String) {
        match self {
            Self::Equals(c) => ("be equal to", format!("'{}'", c.value)),
            Self::Contains(c) => ("contain", format!("'{}'", c.value)),
            Self::StartsWith(c) => ("start with", format!("'{}'", c.value)),
            Self::EndsWith(c) => ("end with", format!("'{}'", c.value)),
            Self::Regex(r) => ("match regex", format!("/{}/", r.as_str())),
        }
    }
}
