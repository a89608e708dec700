//! Request specifications: the matching half of a mapping.

use super::captured::CapturedRequest;
use crate::error::{MokksyError, Result};
use crate::matcher::{self, MatchResult, Matcher, SharedMatcher};
use hyper::header::HeaderMap;
use hyper::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Priority given to mappings that do not set one. Lower values win.
pub const DEFAULT_PRIORITY: i32 = 0;

/// An immutable set of matchers plus priority and optional name.
///
/// A request satisfies the specification when every matcher passes. A
/// specification with no matchers matches every request.
#[derive(Clone)]
pub struct RequestSpecification {
    method: Option<Method>,
    path: Option<SharedMatcher<str>>,
    headers: Vec<SharedMatcher<HeaderMap>>,
    body_string: Vec<SharedMatcher<str>>,
    body: Vec<SharedMatcher<Value>>,
    predicates: Vec<SharedMatcher<CapturedRequest>>,
    priority: i32,
    name: Option<String>,
}

/// One failed matcher in a [`SpecificationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatcherFailure {
    pub matcher: String,
    pub message: String,
}

/// Full evaluation of a specification against one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpecificationReport {
    pub failures: Vec<MatcherFailure>,
}

impl SpecificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

impl RequestSpecification {
    pub fn builder() -> RequestSpecificationBuilder {
        RequestSpecificationBuilder::default()
    }

    /// Specification that matches every request.
    pub fn any() -> Self {
        Self {
            method: None,
            path: None,
            headers: Vec::new(),
            body_string: Vec::new(),
            body: Vec::new(),
            predicates: Vec::new(),
            priority: DEFAULT_PRIORITY,
            name: None,
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Description of the path matcher, `*` when any path is accepted.
    pub fn path_description(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "*".to_string(), |p| p.describe())
    }

    pub fn matcher_count(&self) -> usize {
        usize::from(self.method.is_some())
            + usize::from(self.path.is_some())
            + self.headers.len()
            + self.body_string.len()
            + self.body.len()
            + self.predicates.len()
    }

    /// Whether the request satisfies every matcher.
    ///
    /// Stops at the first failure. The JSON body is only parsed when a
    /// body matcher is reached.
    pub fn matches(&self, request: &CapturedRequest) -> bool {
        if let Some(method) = &self.method {
            if method != request.method() {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !path.test(request.path()).passed() {
                return false;
            }
        }
        if !self
            .headers
            .iter()
            .all(|m| m.test(request.headers()).passed())
        {
            return false;
        }
        if !self
            .body_string
            .iter()
            .all(|m| m.test(request.body_string()).passed())
        {
            return false;
        }
        if !self.body.is_empty() {
            let Ok(json) = request.json() else {
                return false;
            };
            if !self.body.iter().all(|m| m.test(json).passed()) {
                return false;
            }
        }
        self.predicates.iter().all(|m| m.test(request).passed())
    }

    /// Run every matcher and collect the failures.
    pub fn evaluate(&self, request: &CapturedRequest) -> SpecificationReport {
        let mut failures = Vec::new();
        let mut record = |matcher: String, result: MatchResult| {
            if !result.passed() {
                failures.push(MatcherFailure {
                    matcher,
                    message: result.failure_message().to_string(),
                });
            }
        };

        if let Some(method) = &self.method {
            record(format!("method {method}"), method_result(method, request.method()));
        }
        if let Some(path) = &self.path {
            record(path.describe(), path.test(request.path()));
        }
        for m in &self.headers {
            record(m.describe(), m.test(request.headers()));
        }
        for m in &self.body_string {
            record(m.describe(), m.test(request.body_string()));
        }
        if !self.body.is_empty() {
            match request.json() {
                Ok(json) => {
                    for m in &self.body {
                        record(m.describe(), m.test(json));
                    }
                }
                Err(e) => {
                    for m in &self.body {
                        record(m.describe(), MatchResult::new(false, e.to_string(), ""));
                    }
                }
            }
        }
        for m in &self.predicates {
            record(m.describe(), m.test(request));
        }

        SpecificationReport { failures }
    }
}

fn method_result(expected: &Method, actual: &Method) -> MatchResult {
    MatchResult::new(
        expected == actual,
        format!("Method '{actual}' should be equal to '{expected}'"),
        format!("Method '{actual}' should NOT be equal to '{expected}'"),
    )
}

impl fmt::Display for RequestSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "'{name}' ")?;
        }
        match &self.method {
            Some(method) => write!(f, "{method}")?,
            None => f.write_str("*")?,
        }
        write!(f, " {}", self.path_description())
    }
}

impl fmt::Debug for RequestSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpecification")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.path_description())
            .field("matchers", &self.matcher_count())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Free-form predicate over the whole request.
struct RequestPredicate<F> {
    description: String,
    predicate: F,
}

impl<F> Matcher<CapturedRequest> for RequestPredicate<F>
where
    F: Fn(&CapturedRequest) -> bool + Send + Sync,
{
    fn test(&self, request: &CapturedRequest) -> MatchResult {
        let target = format!("Request {} {}", request.method(), request.path());
        MatchResult::new(
            (self.predicate)(request),
            format!("{target} should match predicate '{}'", self.description),
            format!("{target} should NOT match predicate '{}'", self.description),
        )
    }

    fn describe(&self) -> String {
        format!("predicate '{}'", self.description)
    }
}

/// Fluent builder for [`RequestSpecification`].
///
/// Methods taking literals that can be invalid (paths, header names,
/// regexes) record the first error, which [`build`](Self::build) returns.
pub struct RequestSpecificationBuilder {
    spec: RequestSpecification,
    error: Option<MokksyError>,
}

impl Default for RequestSpecificationBuilder {
    fn default() -> Self {
        Self {
            spec: RequestSpecification::any(),
            error: None,
        }
    }
}

impl RequestSpecificationBuilder {
    fn try_push<T>(mut self, result: Result<T>, apply: impl FnOnce(&mut RequestSpecification, T)) -> Self {
        match result {
            Ok(value) => apply(&mut self.spec, value),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.spec.method = Some(method);
        self
    }

    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    pub fn patch(self) -> Self {
        self.method(Method::PATCH)
    }

    /// Exact path.
    pub fn path(self, path: &str) -> Self {
        self.try_push(matcher::path_equals(path), |s, m| s.path = Some(m))
    }

    pub fn path_prefix(self, prefix: &str) -> Self {
        self.try_push(matcher::path_prefix(prefix), |s, m| s.path = Some(m))
    }

    pub fn path_matching(self, pattern: &str) -> Self {
        self.try_push(matcher::path_matches(pattern), |s, m| s.path = Some(m))
    }

    pub fn path_with(mut self, matcher: SharedMatcher<str>) -> Self {
        self.spec.path = Some(matcher);
        self
    }

    /// Header `name` must carry exactly `value`.
    pub fn header(self, name: &str, value: impl Into<String>) -> Self {
        self.try_push(matcher::contains_header(name, value), |s, m| {
            s.headers.push(m)
        })
    }

    pub fn has_header(self, name: &str) -> Self {
        self.try_push(matcher::has_header(name), |s, m| s.headers.push(m))
    }

    pub fn header_with(self, name: &str, value: SharedMatcher<str>) -> Self {
        self.try_push(matcher::header_matches(name, value), |s, m| {
            s.headers.push(m)
        })
    }

    pub fn headers(mut self, matcher: SharedMatcher<HeaderMap>) -> Self {
        self.spec.headers.push(matcher);
        self
    }

    /// Raw body must contain `text`.
    pub fn body_contains(self, text: impl Into<String>) -> Self {
        self.body_string(matcher::contains(text))
    }

    pub fn body_string(mut self, matcher: SharedMatcher<str>) -> Self {
        self.spec.body_string.push(matcher);
        self
    }

    /// JSON body field at `path` must equal `value`.
    pub fn json_field(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body(matcher::json_path_equals(path, value))
    }

    pub fn body(mut self, matcher: SharedMatcher<Value>) -> Self {
        self.spec.body.push(matcher);
        self
    }

    pub fn predicate<F>(mut self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&CapturedRequest) -> bool + Send + Sync + 'static,
    {
        self.spec.predicates.push(Arc::new(RequestPredicate {
            description: description.into(),
            predicate,
        }));
        self
    }

    pub fn request_matcher(mut self, matcher: SharedMatcher<CapturedRequest>) -> Self {
        self.spec.predicates.push(matcher);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<RequestSpecification> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.spec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::header::HeaderValue;

    fn chat_request(body: &'static str) -> CapturedRequest {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer t0k3n"));
        CapturedRequest::new(
            Method::POST,
            "/v1/chat/completions".parse().unwrap(),
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_empty_specification_matches_everything() {
        let spec = RequestSpecification::any();
        assert!(spec.matches(&chat_request("")));
        assert!(spec.evaluate(&chat_request("")).passed());
        assert_eq!(spec.priority(), DEFAULT_PRIORITY);
        assert_eq!(spec.to_string(), "* *");
    }

    #[test]
    fn test_full_specification_matches() {
        let spec = RequestSpecification::builder()
            .post()
            .path("/v1/chat/completions")
            .header("Authorization", "Bearer t0k3n")
            .body_contains("gpt-4")
            .json_field("model", "gpt-4")
            .predicate("has messages", |r| r.body_string().contains("messages"))
            .name("chat")
            .build()
            .unwrap();

        assert!(spec.matches(&chat_request(r#"{"model":"gpt-4","messages":[]}"#)));
        assert_eq!(spec.matcher_count(), 6);
        assert_eq!(
            spec.to_string(),
            "'chat' POST Path should be equal to '/v1/chat/completions'"
        );
    }

    #[test]
    fn test_evaluate_lists_every_failure() {
        let spec = RequestSpecification::builder()
            .get()
            .path("/v1/chat/completions")
            .json_field("model", "gpt-4")
            .build()
            .unwrap();

        let report = spec.evaluate(&chat_request(r#"{"model":"gpt-3"}"#));
        assert_eq!(report.failed_count(), 2);
        assert_eq!(
            report.failures[0].message,
            "Method 'POST' should be equal to 'GET'"
        );
        assert!(report.failures[1].message.contains("\"gpt-4\""));
        assert!(!spec.matches(&chat_request(r#"{"model":"gpt-4"}"#)));
    }

    #[test]
    fn test_malformed_body_fails_json_but_not_string_matchers() {
        let spec = RequestSpecification::builder()
            .body_contains("hello")
            .json_field("a", 1)
            .build()
            .unwrap();

        let request = chat_request("hello, not json");
        assert!(!spec.matches(&request));

        let report = spec.evaluate(&request);
        assert_eq!(report.failed_count(), 1);
        assert!(report.failures[0]
            .message
            .starts_with("Malformed request body"));
    }

    #[test]
    fn test_builder_reports_first_registration_error() {
        let err = RequestSpecification::builder()
            .path("no-slash")
            .header("bad header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, MokksyError::InvalidPath { .. }));

        let err = RequestSpecification::builder()
            .path_matching("(")
            .build()
            .unwrap_err();
        assert!(matches!(err, MokksyError::InvalidRegex { .. }));
    }

    #[test]
    fn test_predicate_failure_message() {
        let spec = RequestSpecification::builder()
            .predicate("is streaming", |r| r.query_param("stream").is_some())
            .build()
            .unwrap();

        let report = spec.evaluate(&chat_request(""));
        assert_eq!(
            report.failures[0].message,
            "Request POST /v1/chat/completions should match predicate 'is streaming'"
        );
    }
}
