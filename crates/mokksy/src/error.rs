//! Error types for the mock server.
//!
//! Matching never produces errors: a request that matches nothing is a normal
//! outcome. The variants here cover registration mistakes, verification
//! failures, body decoding and server lifecycle problems.

use std::net::SocketAddr;

/// Errors raised by registration, verification and server lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum MokksyError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error("The following mappings were not matched:\n{}", format_unmatched(.0))]
    UnmatchedMappings(Vec<String>),
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_unmatched(mappings: &[String]) -> String {
    mappings
        .iter()
        .map(|m| format!("  - {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failure of a streaming body.
///
/// Returned through the HTTP body, where it aborts the connection: chunks
/// already flushed to the client stay delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Chunk source failed: {0}")]
    Source(String),
}

impl StreamError {
    pub fn failed(message: impl Into<String>) -> Self {
        StreamError::Source(message.into())
    }
}

pub type Result<T, E = MokksyError> = std::result::Result<T, E>;
