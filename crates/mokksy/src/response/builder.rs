//! Conversion of response definitions into hyper responses.

use super::body::{self, MockBody};
use super::definition::{ResponseBody, ResponseDefinition};
use super::emitter::StreamingEmitter;
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::str::FromStr;
use tracing::debug;

pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Set a header, replacing earlier values. Invalid pairs are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => debug!("Skipping invalid response header {:?}: {:?}", name, value),
        }
        self
    }

    /// Append headers, keeping repeated names. Invalid pairs are skipped.
    pub fn merge_headers<'a, H>(mut self, headers: H) -> Self
    where
        H: IntoIterator<Item = &'a (String, String)>,
    {
        let mut replaced = Vec::new();
        for (key, value) in headers {
            match (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    // First occurrence overrides defaults, later ones append.
                    if replaced.contains(&name) {
                        self.headers.append(name, value);
                    } else {
                        self.headers.insert(name.clone(), value);
                        replaced.push(name);
                    }
                }
                _ => debug!("Skipping invalid response header {:?}: {:?}", key, value),
            }
        }
        self
    }

    pub fn build(self, body: MockBody) -> Response<MockBody> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

/// JSON response with the given status.
pub fn json_response(status: StatusCode, payload: &serde_json::Value) -> Response<MockBody> {
    ResponseBuilder::new(status)
        .header(CONTENT_TYPE.as_str(), "application/json")
        .build(body::full(payload.to_string()))
}

/// Turn a definition into a response.
///
/// Streaming bodies start their emitter immediately; the definition's delay
/// becomes the emitter's lead-in. Static delays are the caller's concern.
pub fn into_response(definition: ResponseDefinition, label: String) -> Response<MockBody> {
    let content_type = definition.effective_content_type().to_string();
    let mut builder =
        ResponseBuilder::new(definition.status).header(CONTENT_TYPE.as_str(), &content_type);

    let body = match definition.body {
        ResponseBody::Empty => body::empty(),
        ResponseBody::Static(bytes) => body::full(bytes),
        ResponseBody::Stream(spec) => {
            builder = if spec.sse {
                builder
                    .header(CACHE_CONTROL.as_str(), "no-store")
                    .header(CONNECTION.as_str(), "keep-alive")
                    .header("x-accel-buffering", "no")
            } else {
                builder.header(CACHE_CONTROL.as_str(), "no-cache")
            };
            StreamingEmitter::new(spec, definition.delay)
                .spawn(label)
                .boxed()
        }
    };

    builder.merge_headers(&definition.headers).build(body)
}
