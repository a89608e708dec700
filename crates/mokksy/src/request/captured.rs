//! Inbound request as seen by matchers and responders.

use crate::error::{MokksyError, Result};
use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::OnceLock;

/// A fully-buffered inbound request.
///
/// Method, path, query and headers are captured when the request arrives.
/// The body is read once; its UTF-8 decoding and JSON parse are computed on
/// first use and cached, so any number of matchers share a single parse.
#[derive(Debug)]
pub struct CapturedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    body_string: OnceLock<String>,
    json: OnceLock<std::result::Result<Value, String>>,
}

impl CapturedRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            remote_addr: None,
            body_string: OnceLock::new(),
            json: OnceLock::new(),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters in request order.
    pub fn query_params(&self) -> Vec<(String, String)> {
        parse_query_string(self.query())
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text; invalid UTF-8 sequences are replaced.
    pub fn body_string(&self) -> &str {
        self.body_string
            .get_or_init(|| String::from_utf8_lossy(&self.body).into_owned())
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Result<&Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|reason| MokksyError::MalformedBody(reason.clone()))
    }

    /// Body deserialised into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(self.json()?).map_err(|e| MokksyError::MalformedBody(e.to_string()))
    }
}

fn parse_query_string(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return Vec::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(uri: &str, body: &'static str) -> CapturedRequest {
        CapturedRequest::new(
            Method::POST,
            uri.parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_path_and_query_params() {
        let req = request("/v1/search?q=hello%20world&limit=10&flag&tag=a+b", "");
        assert_eq!(req.path(), "/v1/search");
        assert_eq!(req.query_param("q").as_deref(), Some("hello world"));
        assert_eq!(req.query_param("limit").as_deref(), Some("10"));
        assert_eq!(req.query_param("flag").as_deref(), Some(""));
        assert_eq!(req.query_param("tag").as_deref(), Some("a b"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_json_is_parsed_once() {
        let req = request("/", r#"{"model":"gpt-4"}"#);
        let first = req.json().unwrap() as *const Value;
        let second = req.json().unwrap() as *const Value;
        assert_eq!(first, second);
        assert_eq!(req.json().unwrap()["model"], "gpt-4");
    }

    #[test]
    fn test_malformed_json_keeps_raw_body_available() {
        let req = request("/", "not json");
        assert!(matches!(req.json(), Err(MokksyError::MalformedBody(_))));
        assert_eq!(req.body_string(), "not json");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Embedding {
        input: String,
    }

    #[test]
    fn test_body_as_typed() {
        let req = request("/", r#"{"input":"hello","model":"m"}"#);
        let typed: Embedding = req.body_as().unwrap();
        assert_eq!(
            typed,
            Embedding {
                input: "hello".to_string()
            }
        );

        let err = request("/", r#"{"model":"m"}"#)
            .body_as::<Embedding>()
            .unwrap_err();
        assert!(err.to_string().contains("input"));
    }
}
