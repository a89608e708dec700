//! Header matchers.
//!
//! Header names are validated when the matcher is built; lookups are
//! case-insensitive because `HeaderMap` normalises names. A header that
//! appears several times passes when any of its values passes.

use super::core::{MatchResult, Matcher, SharedMatcher};
use crate::error::{MokksyError, Result};
use hyper::header::{HeaderMap, HeaderName};
use std::sync::Arc;

fn parse_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| MokksyError::InvalidHeaderName(name.to_string()))
}

fn values_of(headers: &HeaderMap, name: &HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect()
}

fn display_values(values: &[String]) -> String {
    match values {
        [] => "null".to_string(),
        [single] => single.clone(),
        many => many.join(", "),
    }
}

/// Header `name` must be present with exactly `value`.
pub struct ContainsHeader {
    name: HeaderName,
    expected: String,
}

impl Matcher<HeaderMap> for ContainsHeader {
    fn test(&self, headers: &HeaderMap) -> MatchResult {
        let values = values_of(headers, &self.name);
        let passed = values.iter().any(|v| v == &self.expected);
        let actual = display_values(&values);
        MatchResult::new(
            passed,
            format!(
                "Headers should contain a header '{}' with value '{}', but was '{}'.",
                self.name, self.expected, actual
            ),
            format!(
                "Headers should NOT contain a header '{}' with value '{}'.",
                self.name, self.expected
            ),
        )
    }

    fn describe(&self) -> String {
        format!("header '{}' = '{}'", self.name, self.expected)
    }
}

/// Header `name` must be present, with any value.
pub struct HasHeader {
    name: HeaderName,
}

impl Matcher<HeaderMap> for HasHeader {
    fn test(&self, headers: &HeaderMap) -> MatchResult {
        MatchResult::new(
            headers.contains_key(&self.name),
            format!("Headers should contain a header '{}'.", self.name),
            format!("Headers should NOT contain a header '{}'.", self.name),
        )
    }

    fn describe(&self) -> String {
        format!("header '{}' present", self.name)
    }
}

/// Some value of header `name` must satisfy a string matcher.
pub struct HeaderMatches {
    name: HeaderName,
    inner: SharedMatcher<str>,
}

impl Matcher<HeaderMap> for HeaderMatches {
    fn test(&self, headers: &HeaderMap) -> MatchResult {
        let values = values_of(headers, &self.name);
        if values.is_empty() {
            return MatchResult::new(
                false,
                format!(
                    "Headers should contain a header '{}' where {}, but it was absent.",
                    self.name,
                    self.inner.describe()
                ),
                format!("Headers should NOT contain a header '{}'.", self.name),
            );
        }

        let results: Vec<MatchResult> = values.iter().map(|v| self.inner.test(v)).collect();
        match results.iter().find(|r| r.passed()) {
            Some(hit) => MatchResult::new(
                true,
                String::new(),
                format!("Header '{}': {}", self.name, hit.negated_failure_message()),
            ),
            None => MatchResult::new(
                false,
                format!(
                    "Header '{}': {}",
                    self.name,
                    results
                        .iter()
                        .map(|r| r.failure_message())
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
                String::new(),
            ),
        }
    }

    fn describe(&self) -> String {
        format!("header '{}' where {}", self.name, self.inner.describe())
    }
}

pub fn contains_header(name: &str, value: impl Into<String>) -> Result<SharedMatcher<HeaderMap>> {
    Ok(Arc::new(ContainsHeader {
        name: parse_name(name)?,
        expected: value.into(),
    }))
}

pub fn has_header(name: &str) -> Result<SharedMatcher<HeaderMap>> {
    Ok(Arc::new(HasHeader {
        name: parse_name(name)?,
    }))
}

pub fn header_matches(name: &str, inner: SharedMatcher<str>) -> Result<SharedMatcher<HeaderMap>> {
    Ok(Arc::new(HeaderMatches {
        name: parse_name(name)?,
        inner,
    }))
}
