//! Request dispatch for the mock server.
//!
//! Collects the request, asks the registry for the winning mapping, records
//! the call and writes the response. Requests that match nothing get a 404
//! whose JSON body lists every mapping plus the closest candidates.

use crate::mapping::{Candidate, MappingRegistry, MappingSummary};
use crate::metrics;
use crate::request::CapturedRequest;
use crate::response::builder::{into_response, json_response};
use crate::response::MockBody;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Number of near-miss mappings reported in a 404 body.
const CLOSEST_CANDIDATES: usize = 3;

/// State shared by every connection of one server.
pub struct ServerState {
    pub registry: MappingRegistry,
    pub verbose: bool,
}

impl ServerState {
    pub fn new(verbose: bool) -> Self {
        Self {
            registry: MappingRegistry::new(),
            verbose,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnmatchedRequest {
    method: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundBody {
    error: &'static str,
    request: UnmatchedRequest,
    mappings: Vec<MappingSummary>,
    closest_candidates: Vec<Candidate>,
}

/// Handle a request to the mock server
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
    client_addr: SocketAddr,
) -> Result<Response<MockBody>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let request = CapturedRequest::new(parts.method, parts.uri, parts.headers, Bytes::new())
                .with_remote_addr(client_addr);
            return Ok(body_read_failed(request, &state, &e.to_string()));
        }
    };

    let request = CapturedRequest::new(parts.method, parts.uri, parts.headers, body)
        .with_remote_addr(client_addr);
    Ok(dispatch(request, &state).await)
}

/// A request whose body could not be read in full is never matched. It is
/// recorded as unmatched and answered with 400.
fn body_read_failed(
    request: CapturedRequest,
    state: &ServerState,
    reason: &str,
) -> Response<MockBody> {
    warn!(
        "Failed to read request body of {} {} from {:?}: {}",
        request.method(),
        request.uri(),
        request.remote_addr(),
        reason
    );
    metrics::record_request(request.method().as_str(), false);
    state.registry.record_call(Arc::new(request), None);
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({
            "error": "Failed to read request body",
            "reason": reason,
        }),
    )
}

/// Match, record and respond. Transport independent.
pub async fn dispatch(request: CapturedRequest, state: &ServerState) -> Response<MockBody> {
    let request = Arc::new(request);
    let registry = &state.registry;

    let Some(mapping) = registry.find_match(&request) else {
        registry.record_call(Arc::clone(&request), None);
        metrics::record_request(request.method().as_str(), false);
        warn!(
            "No mapping matched {} {} ({} mappings registered)",
            request.method(),
            request.uri(),
            registry.len()
        );
        if state.verbose {
            for summary in registry.summaries() {
                info!("  available: {:?}", summary);
            }
        }
        return not_found(registry, &request);
    };

    registry.record_call(Arc::clone(&request), Some(mapping.id));
    metrics::record_request(request.method().as_str(), true);
    if state.verbose || mapping.options.verbose {
        info!("{} {} matched mapping {}", request.method(), request.uri(), mapping);
    } else {
        debug!("{} {} matched mapping {}", request.method(), request.uri(), mapping);
    }

    let definition = mapping.respond(&request);
    let delay_ms = delay_millis(definition.delay);
    if definition.is_stream() {
        if delay_ms > 0 {
            metrics::record_response_delay("stream", delay_ms);
        }
    } else if delay_ms > 0 {
        metrics::record_response_delay("static", delay_ms);
        debug!("Delaying response of mapping {} by {}ms", mapping.id, delay_ms);
        tokio::time::sleep(definition.delay).await;
    }

    into_response(definition, mapping.to_string())
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn not_found(registry: &MappingRegistry, request: &CapturedRequest) -> Response<MockBody> {
    let body = NotFoundBody {
        error: "No mapping matched the request",
        request: UnmatchedRequest {
            method: request.method().to_string(),
            path: request.path().to_string(),
            query: request.query().map(str::to_string),
        },
        mappings: registry.summaries(),
        closest_candidates: registry.closest_candidates(request, CLOSEST_CANDIDATES),
    };

    match serde_json::to_value(&body) {
        Ok(payload) => json_response(StatusCode::NOT_FOUND, &payload),
        Err(e) => {
            warn!("Failed to serialize 404 diagnostics: {}", e);
            json_response(
                StatusCode::NOT_FOUND,
                &serde_json::json!({ "error": body.error }),
            )
        }
    }
}
