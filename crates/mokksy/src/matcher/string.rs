//! String matchers used for paths, raw bodies and header values.

use super::core::{CachedValue, MatchResult, Matcher, SharedMatcher, StringMatchCore};
use crate::error::{MokksyError, Result};
use regex::Regex;
use std::sync::Arc;

/// A compiled string matcher.
///
/// `subject` names the value being tested ("Path", "Body", ...) so failure
/// messages read naturally in 404 diagnostics.
#[derive(Debug, Clone)]
pub struct StringMatcher {
    subject: &'static str,
    core: StringMatchCore,
    case_sensitive: bool,
    negated: bool,
}

impl StringMatcher {
    pub fn new(core: StringMatchCore, case_sensitive: bool) -> Self {
        Self {
            subject: "Value",
            core,
            case_sensitive,
            negated: false,
        }
    }

    pub fn with_subject(mut self, subject: &'static str) -> Self {
        self.subject = subject;
        self
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn expectation(&self, negated: bool) -> String {
        let (verb, operand) = self.core.verb_and_operand();
        let not = if negated { "NOT " } else { "" };
        let suffix = if self.case_sensitive {
            ""
        } else {
            " ignoring case"
        };
        format!("should {not}{verb} {operand}{suffix}")
    }

    pub fn into_shared(self) -> SharedMatcher<str> {
        Arc::new(self)
    }
}

impl Matcher<str> for StringMatcher {
    fn test(&self, value: &str) -> MatchResult {
        let passed = self.core.matches(value, self.case_sensitive) != self.negated;
        let subject = self.subject;
        MatchResult::new(
            passed,
            format!("{subject} '{value}' {}", self.expectation(self.negated)),
            format!("{subject} '{value}' {}", self.expectation(!self.negated)),
        )
    }

    fn describe(&self) -> String {
        format!("{} {}", self.subject, self.expectation(self.negated))
    }
}

pub fn equals(expected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::Equals(CachedValue::new(expected)), true).into_shared()
}

pub fn equals_ignoring_case(expected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::Equals(CachedValue::new(expected)), false).into_shared()
}

pub fn contains(expected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::Contains(CachedValue::new(expected)), true).into_shared()
}

pub fn contains_ignoring_case(expected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::Contains(CachedValue::new(expected)), false)
        .into_shared()
}

pub fn does_not_contain(unexpected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::Contains(CachedValue::new(unexpected)), true)
        .negated()
        .into_shared()
}

pub fn does_not_contain_ignoring_case(unexpected: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(
        StringMatchCore::Contains(CachedValue::new(unexpected)),
        false,
    )
    .negated()
    .into_shared()
}

pub fn starts_with(prefix: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::StartsWith(CachedValue::new(prefix)), true).into_shared()
}

pub fn ends_with(suffix: impl Into<String>) -> SharedMatcher<str> {
    StringMatcher::new(StringMatchCore::EndsWith(CachedValue::new(suffix)), true).into_shared()
}

/// Compile a regex matcher. An invalid pattern is a registration error.
pub fn regex(pattern: &str) -> Result<SharedMatcher<str>> {
    Ok(StringMatcher::new(compile_regex(pattern)?, true).into_shared())
}

pub(crate) fn compile_regex(pattern: &str) -> Result<StringMatchCore> {
    let compiled = Regex::new(pattern).map_err(|source| MokksyError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(StringMatchCore::Regex(Arc::new(compiled)))
}

fn require_leading_slash(path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(MokksyError::InvalidPath {
            path: path.to_string(),
            reason: "path must start with '/'".to_string(),
        })
    }
}

/// Exact path match.
pub fn path_equals(path: &str) -> Result<SharedMatcher<str>> {
    require_leading_slash(path)?;
    Ok(
        StringMatcher::new(StringMatchCore::Equals(CachedValue::new(path)), true)
            .with_subject("Path")
            .into_shared(),
    )
}

/// Match every path under `prefix`.
pub fn path_prefix(prefix: &str) -> Result<SharedMatcher<str>> {
    require_leading_slash(prefix)?;
    Ok(
        StringMatcher::new(StringMatchCore::StartsWith(CachedValue::new(prefix)), true)
            .with_subject("Path")
            .into_shared(),
    )
}

/// Match the path against a regular expression.
pub fn path_matches(pattern: &str) -> Result<SharedMatcher<str>> {
    Ok(StringMatcher::new(compile_regex(pattern)?, true)
        .with_subject("Path")
        .into_shared())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals_failure_message_names_both_values() {
        let m = equals("gpt-4");
        let result = m.test("gpt-3");
        assert!(!result.passed());
        assert_eq!(
            result.failure_message(),
            "Value 'gpt-3' should be equal to 'gpt-4'"
        );
    }

    #[test]
    fn test_ignoring_case_variants() {
        assert!(equals_ignoring_case("Hello").test("hELLO").passed());
        assert!(contains_ignoring_case("WORLD").test("hello world").passed());
        assert!(!contains("WORLD").test("hello world").passed());
    }

    #[test]
    fn test_does_not_contain() {
        let m = does_not_contain("secret");
        assert!(m.test("public data").passed());

        let failed = m.test("my secret data");
        assert!(!failed.passed());
        assert_eq!(
            failed.failure_message(),
            "Value 'my secret data' should NOT contain 'secret'"
        );

        assert!(!does_not_contain_ignoring_case("SECRET")
            .test("my secret")
            .passed());
    }

    #[test]
    fn test_starts_and_ends_with() {
        assert!(starts_with("Bearer ").test("Bearer abc").passed());
        assert!(ends_with("/completions").test("/v1/chat/completions").passed());
        assert!(!ends_with("/completions").test("/v1/embeddings").passed());
    }

    #[test]
    fn test_regex_compile_error_is_reported() {
        let err = regex("[unclosed").unwrap_err();
        assert!(matches!(err, MokksyError::InvalidRegex { .. }));
    }

    #[test]
    fn test_path_literal_must_start_with_slash() {
        assert!(path_equals("/v1/chat").is_ok());
        let err = path_equals("v1/chat").unwrap_err();
        assert!(matches!(err, MokksyError::InvalidPath { .. }));
        assert!(path_prefix("api").is_err());
    }

    #[test]
    fn test_path_equals_message() {
        let m = path_equals("/v1/chat").unwrap();
        let result = m.test("/v1/embeddings");
        assert_eq!(
            result.failure_message(),
            "Path '/v1/embeddings' should be equal to '/v1/chat'"
        );
        assert_eq!(m.describe(), "Path should be equal to '/v1/chat'");
    }

    #[test]
    fn test_path_matches_regex() {
        let m = path_matches(r"^/v1/models/[^/]+$").unwrap();
        assert!(m.test("/v1/models/gpt-4").passed());
        assert!(!m.test("/v1/models/gpt-4/extra").passed());
    }
}
