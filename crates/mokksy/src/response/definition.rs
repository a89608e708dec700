//! Response definitions produced by mapping responders.

use super::stream::StreamSpec;
use bytes::Bytes;
use hyper::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

#[derive(Debug)]
pub enum ResponseBody {
    Empty,
    Static(Bytes),
    Stream(StreamSpec),
}

/// Everything needed to write one response.
///
/// `delay` is applied before the response head for static bodies and as the
/// emitter's lead-in for streams.
#[derive(Debug)]
pub struct ResponseDefinition {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub delay: Duration,
    pub body: ResponseBody,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl ResponseDefinition {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content_type: None,
            delay: Duration::ZERO,
            body: ResponseBody::Empty,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Status from a raw code; unknown codes become 500.
    pub fn with_status_code(code: u16) -> Self {
        Self::new(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Invalid names or values are skipped when the response is written.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ResponseBody::Static(body.into());
        self
    }

    pub fn json(self, value: impl Into<Value>) -> Self {
        let value: Value = value.into();
        self.body(value.to_string())
    }

    pub fn stream(mut self, spec: StreamSpec) -> Self {
        self.body = ResponseBody::Stream(spec);
        self
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.body, ResponseBody::Stream(_))
    }

    /// Content type written on the wire.
    pub fn effective_content_type(&self) -> &str {
        if let Some(content_type) = &self.content_type {
            return content_type;
        }
        match &self.body {
            ResponseBody::Stream(_) => EVENT_STREAM_CONTENT_TYPE,
            _ => JSON_CONTENT_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_content_types() {
        assert_eq!(ResponseDefinition::ok().effective_content_type(), "application/json");
        assert_eq!(
            ResponseDefinition::ok()
                .stream(StreamSpec::chunks(["a"]).sse())
                .effective_content_type(),
            "text/event-stream; charset=utf-8"
        );
        assert_eq!(
            ResponseDefinition::ok()
                .stream(StreamSpec::chunks(["a"]))
                .effective_content_type(),
            "text/event-stream; charset=utf-8"
        );
        assert_eq!(
            ResponseDefinition::ok()
                .content_type("text/html")
                .effective_content_type(),
            "text/html"
        );
    }

    #[test]
    fn test_json_body() {
        let def = ResponseDefinition::with_status_code(201).json(json!({"id": "chatcmpl-1"}));
        assert_eq!(def.status, StatusCode::CREATED);
        assert!(matches!(def.body, ResponseBody::Static(ref b) if b == r#"{"id":"chatcmpl-1"}"#));
    }

    #[test]
    fn test_unknown_status_code_falls_back_to_500() {
        assert_eq!(
            ResponseDefinition::with_status_code(42).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
