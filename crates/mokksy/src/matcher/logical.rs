//! Logical combinators: NOT, AND, OR.

use super::core::{MatchResult, Matcher, SharedMatcher};
use std::sync::Arc;

pub enum LogicalMatcher<T: ?Sized> {
    /// Negates the inner matcher
    Not(SharedMatcher<T>),
    /// Matches if ALL of the inner matchers match
    All(Vec<SharedMatcher<T>>),
    /// Matches if ANY of the inner matchers match
    Any(Vec<SharedMatcher<T>>),
}

impl<T: ?Sized + 'static> Matcher<T> for LogicalMatcher<T> {
    fn test(&self, value: &T) -> MatchResult {
        match self {
            LogicalMatcher::Not(inner) => inner.test(value).negate(),
            LogicalMatcher::All(matchers) => {
                let failures: Vec<MatchResult> = matchers
                    .iter()
                    .map(|m| m.test(value))
                    .filter(|r| !r.passed())
                    .collect();
                MatchResult::new(
                    failures.is_empty(),
                    join(failures.iter().map(MatchResult::failure_message), " AND "),
                    format!("should NOT satisfy {}", self.describe()),
                )
            }
            LogicalMatcher::Any(matchers) => {
                let results: Vec<MatchResult> = matchers.iter().map(|m| m.test(value)).collect();
                let passed = results.iter().any(MatchResult::passed);
                MatchResult::new(
                    passed,
                    join(results.iter().map(MatchResult::failure_message), " OR "),
                    join(
                        results
                            .iter()
                            .filter(|r| r.passed())
                            .map(MatchResult::negated_failure_message),
                        " AND ",
                    ),
                )
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            LogicalMatcher::Not(inner) => format!("not({})", inner.describe()),
            LogicalMatcher::All(matchers) => {
                format!("all_of({})", join(matchers.iter().map(|m| m.describe()), ", "))
            }
            LogicalMatcher::Any(matchers) => {
                format!("any_of({})", join(matchers.iter().map(|m| m.describe()), ", "))
            }
        }
    }
}

fn join<S: AsRef<str>>(parts: impl Iterator<Item = S>, separator: &str) -> String {
    parts
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn not<T: ?Sized + 'static>(inner: SharedMatcher<T>) -> SharedMatcher<T> {
    Arc::new(LogicalMatcher::Not(inner))
}

/// An empty list passes.
pub fn all_of<T: ?Sized + 'static>(matchers: Vec<SharedMatcher<T>>) -> SharedMatcher<T> {
    Arc::new(LogicalMatcher::All(matchers))
}

/// An empty list fails.
pub fn any_of<T: ?Sized + 'static>(matchers: Vec<SharedMatcher<T>>) -> SharedMatcher<T> {
    Arc::new(LogicalMatcher::Any(matchers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::string::{contains, equals, starts_with};

    #[test]
    fn test_not_swaps_messages() {
        let m = not(equals("admin"));
        assert!(m.test("guest").passed());

        let failed = m.test("admin");
        assert!(!failed.passed());
        assert_eq!(
            failed.failure_message(),
            "Value 'admin' should NOT be equal to 'admin'"
        );
    }

    #[test]
    fn test_all_of_reports_only_failures() {
        let m = all_of(vec![starts_with("/v1"), contains("chat"), contains("stream")]);
        assert!(m.test("/v1/chat/stream").passed());

        let failed = m.test("/v1/chat");
        assert!(!failed.passed());
        assert_eq!(
            failed.failure_message(),
            "Value '/v1/chat' should contain 'stream'"
        );
    }

    #[test]
    fn test_any_of() {
        let m = any_of(vec![equals("gpt-4"), equals("gpt-4o")]);
        assert!(m.test("gpt-4o").passed());
        assert!(!m.test("claude").passed());
        assert_eq!(
            m.describe(),
            "any_of(Value should be equal to 'gpt-4', Value should be equal to 'gpt-4o')"
        );
    }

    #[test]
    fn test_empty_combinators() {
        assert!(all_of::<str>(vec![]).test("anything").passed());
        assert!(!any_of::<str>(vec![]).test("anything").passed());
    }
}
