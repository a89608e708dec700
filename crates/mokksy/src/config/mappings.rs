//! Declarative mappings loaded from configuration files.

use crate::error::{MokksyError, Result};
use crate::mapping::{MappingOptions, Responder};
use crate::request::{CapturedRequest, RequestSpecification, DEFAULT_PRIORITY};
use crate::response::{ResponseDefinition, StreamSpec};
use base64::Engine;
use bytes::Bytes;
use hyper::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub remove_after_match: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub response: ResponseConfig,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Exact path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    /// Regular expression over the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_matches: Option<String>,
    /// Required header values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Substrings the raw body must contain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_contains: Vec<String>,
    /// JSON body fields that must equal the given values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub json_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    #[default]
    Text,
    /// `body` holds base64-encoded bytes
    Binary,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub mode: BodyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamConfig>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            content_type: None,
            delay_ms: 0,
            json: None,
            text: None,
            body: None,
            mode: BodyMode::Text,
            stream: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamConfig {
    pub chunks: Vec<String>,
    #[serde(default)]
    pub chunk_delay_ms: u64,
    #[serde(default)]
    pub sse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<String>,
}

/// Response parts fixed at load time, rebuilt into a definition per request.
#[derive(Debug)]
struct CompiledResponse {
    status: u16,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    delay: Duration,
    body: Option<Bytes>,
    stream: Option<StreamConfig>,
}

impl CompiledResponse {
    fn definition(&self) -> ResponseDefinition {
        let mut definition = ResponseDefinition::with_status_code(self.status)
            .delay(self.delay);
        definition.headers = self.headers.clone();
        definition.content_type = self.content_type.clone();

        if let Some(stream) = &self.stream {
            let mut spec = StreamSpec::chunks(stream.chunks.iter().map(String::as_str))
                .chunk_delay(Duration::from_millis(stream.chunk_delay_ms));
            if stream.sse {
                spec = spec.sse();
            }
            if let Some(sentinel) = &stream.sentinel {
                spec = spec.sentinel(sentinel.as_str());
            }
            definition.stream(spec)
        } else if let Some(body) = &self.body {
            definition.body(body.clone())
        } else {
            definition
        }
    }
}

impl MappingConfig {
    /// Build the specification, options and responder this entry describes.
    pub fn compile(&self) -> Result<(RequestSpecification, MappingOptions, Responder)> {
        let specification = self.request.specification(self.name.as_deref(), self.priority)?;
        let options = MappingOptions {
            remove_after_match: self.remove_after_match,
            verbose: self.verbose,
        };
        let compiled = Arc::new(self.response.compile()?);
        let responder: Responder =
            Arc::new(move |_: &CapturedRequest| compiled.definition());
        Ok((specification, options, responder))
    }
}

impl RequestConfig {
    fn specification(&self, name: Option<&str>, priority: i32) -> Result<RequestSpecification> {
        let path_count = [&self.path, &self.path_prefix, &self.path_matches]
            .iter()
            .filter(|p| p.is_some())
            .count();
        if path_count > 1 {
            return Err(MokksyError::InvalidArgument(
                "only one of path, path_prefix and path_matches may be set".to_string(),
            ));
        }

        let mut builder = RequestSpecification::builder().priority(priority);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(method) = &self.method {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|_| MokksyError::InvalidArgument(format!("invalid method '{method}'")))?;
            builder = builder.method(method);
        }
        if let Some(path) = &self.path {
            builder = builder.path(path);
        }
        if let Some(prefix) = &self.path_prefix {
            builder = builder.path_prefix(prefix);
        }
        if let Some(pattern) = &self.path_matches {
            builder = builder.path_matching(pattern);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name, value.as_str());
        }
        for text in &self.body_contains {
            builder = builder.body_contains(text.as_str());
        }
        for (path, value) in &self.json_fields {
            builder = builder.json_field(path.as_str(), value.clone());
        }
        builder.build()
    }
}

impl ResponseConfig {
    fn compile(&self) -> Result<CompiledResponse> {
        let bodies = [self.json.is_some(), self.text.is_some(), self.body.is_some(), self.stream.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if bodies > 1 {
            return Err(MokksyError::InvalidArgument(
                "only one of json, text, body and stream may be set".to_string(),
            ));
        }

        let body = if let Some(json) = &self.json {
            Some(Bytes::from(json.to_string()))
        } else if let Some(text) = &self.text {
            Some(Bytes::from(text.clone()))
        } else if let Some(raw) = &self.body {
            match self.mode {
                BodyMode::Text => Some(Bytes::from(raw.clone())),
                BodyMode::Binary => {
                    let decoded = base64::engine::general_purpose::STANDARD
                        .decode(raw)
                        .map_err(|e| MokksyError::Config(format!("invalid base64 body: {e}")))?;
                    Some(Bytes::from(decoded))
                }
            }
        } else {
            None
        };

        // Plain text bodies default to text/plain rather than JSON.
        let content_type = self.content_type.clone().or_else(|| {
            self.text
                .as_ref()
                .map(|_| "text/plain; charset=utf-8".to_string())
        });

        Ok(CompiledResponse {
            status: self.status,
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            content_type,
            delay: Duration::from_millis(self.delay_ms),
            body,
            stream: self.stream.clone(),
        })
    }
}
