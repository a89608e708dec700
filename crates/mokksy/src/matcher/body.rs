//! JSON body matchers.
//!
//! These run against the request body parsed once into a
//! `serde_json::Value`. Field paths use a small dotted syntax:
//! - `field` or `$.field` - top-level field
//! - `field.nested` - nested field
//! - `items[0].name` - array index
//! - `items[*].name` - first element whose `name` exists

use super::core::{MatchResult, Matcher, SharedMatcher};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Navigate a JSON value following a dotted path.
pub fn navigate_json<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let path = path.strip_prefix('$').unwrap_or(path);
    navigate(value, path)
}

fn navigate<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    // Array index
    if let Some(inner) = path.strip_prefix('[') {
        let end = inner.find(']')?;
        let index = &inner[..end];
        let rest = &inner[end + 1..];
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        let items = value.as_array()?;

        if index == "*" {
            return items.iter().find_map(|item| navigate(item, rest));
        }
        let index: usize = index.parse().ok()?;
        return navigate(items.get(index)?, rest);
    }

    // Object field, up to the next '.' or '['
    let split = path.find(['.', '[']).unwrap_or(path.len());
    let (segment, rest) = path.split_at(split);
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    navigate(value.as_object()?.get(segment)?, rest)
}

/// Structural equality where expected objects may omit keys.
///
/// Arrays must have the same length and order; every key of an expected
/// object must be present in the actual object with an equal value.
pub fn json_contains_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| json_contains_value(x, y))
        }
        (Value::Object(a), Value::Object(b)) => b.iter().all(|(key, expected_val)| {
            a.get(key)
                .is_some_and(|actual_val| json_contains_value(actual_val, expected_val))
        }),
        _ => actual == expected,
    }
}

/// Strings render without quotes so path matchers see the raw text.
fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display(value: Option<&Value>) -> String {
    value.map_or_else(|| "<absent>".to_string(), Value::to_string)
}

enum FieldCheck {
    Equals(Value),
    Exists,
    Text(SharedMatcher<str>),
}

/// Matcher over a single field of the JSON body.
pub struct JsonPathMatcher {
    path: String,
    check: FieldCheck,
}

impl Matcher<Value> for JsonPathMatcher {
    fn test(&self, body: &Value) -> MatchResult {
        let actual = navigate_json(body, &self.path);
        let path = &self.path;
        match &self.check {
            FieldCheck::Equals(expected) => {
                let passed = actual == Some(expected);
                MatchResult::new(
                    passed,
                    format!(
                        "Body field '{path}' should be equal to {expected}, but was {}",
                        display(actual)
                    ),
                    format!("Body field '{path}' should NOT be equal to {expected}"),
                )
            }
            FieldCheck::Exists => MatchResult::new(
                actual.is_some(),
                format!("Body should contain field '{path}'"),
                format!("Body should NOT contain field '{path}'"),
            ),
            FieldCheck::Text(inner) => match actual {
                Some(value) => {
                    let result = inner.test(&value_as_text(value));
                    MatchResult::new(
                        result.passed(),
                        format!("Body field '{path}': {}", result.failure_message()),
                        format!("Body field '{path}': {}", result.negated_failure_message()),
                    )
                }
                None => MatchResult::new(
                    false,
                    format!(
                        "Body field '{path}' should exist where {}",
                        inner.describe()
                    ),
                    format!("Body field '{path}' should NOT exist"),
                ),
            },
        }
    }

    fn describe(&self) -> String {
        match &self.check {
            FieldCheck::Equals(expected) => format!("body field '{}' = {expected}", self.path),
            FieldCheck::Exists => format!("body field '{}' present", self.path),
            FieldCheck::Text(inner) => {
                format!("body field '{}' where {}", self.path, inner.describe())
            }
        }
    }
}

/// Whole-body comparison.
pub struct JsonBodyMatcher {
    expected: Value,
    partial: bool,
}

impl Matcher<Value> for JsonBodyMatcher {
    fn test(&self, body: &Value) -> MatchResult {
        let passed = if self.partial {
            json_contains_value(body, &self.expected)
        } else {
            body == &self.expected
        };
        let verb = if self.partial { "contain" } else { "be equal to" };
        MatchResult::new(
            passed,
            format!("Body {body} should {verb} {}", self.expected),
            format!("Body {body} should NOT {verb} {}", self.expected),
        )
    }

    fn describe(&self) -> String {
        if self.partial {
            format!("body contains {}", self.expected)
        } else {
            format!("body = {}", self.expected)
        }
    }
}

/// Deserialises the body into `T` and applies a predicate.
pub struct TypedBodyMatcher<T, F> {
    description: String,
    predicate: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Matcher<Value> for TypedBodyMatcher<T, F>
where
    T: DeserializeOwned + fmt::Debug,
    F: Fn(&T) -> bool + Send + Sync,
{
    fn test(&self, body: &Value) -> MatchResult {
        match T::deserialize(body) {
            Ok(typed) => MatchResult::new(
                (self.predicate)(&typed),
                format!("{typed:?} should match '{}'", self.description),
                format!("{typed:?} should NOT match '{}'", self.description),
            ),
            Err(e) => MatchResult::new(
                false,
                format!(
                    "Body could not be read as {}: {e}",
                    std::any::type_name::<T>()
                ),
                String::new(),
            ),
        }
    }

    fn describe(&self) -> String {
        format!("typed body '{}'", self.description)
    }
}

pub fn json_path_equals(path: impl Into<String>, expected: impl Into<Value>) -> SharedMatcher<Value> {
    Arc::new(JsonPathMatcher {
        path: path.into(),
        check: FieldCheck::Equals(expected.into()),
    })
}

pub fn json_path_exists(path: impl Into<String>) -> SharedMatcher<Value> {
    Arc::new(JsonPathMatcher {
        path: path.into(),
        check: FieldCheck::Exists,
    })
}

pub fn json_path_matches(path: impl Into<String>, inner: SharedMatcher<str>) -> SharedMatcher<Value> {
    Arc::new(JsonPathMatcher {
        path: path.into(),
        check: FieldCheck::Text(inner),
    })
}

/// Exact equality with the whole body.
pub fn json_equals(expected: impl Into<Value>) -> SharedMatcher<Value> {
    Arc::new(JsonBodyMatcher {
        expected: expected.into(),
        partial: false,
    })
}

/// The body contains every key of `expected` with equal values.
pub fn json_contains(expected: impl Into<Value>) -> SharedMatcher<Value> {
    Arc::new(JsonBodyMatcher {
        expected: expected.into(),
        partial: true,
    })
}

pub fn typed<T, F>(description: impl Into<String>, predicate: F) -> SharedMatcher<Value>
where
    T: DeserializeOwned + fmt::Debug + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Arc::new(TypedBodyMatcher {
        description: description.into(),
        predicate,
        _marker: PhantomData,
    })
}
