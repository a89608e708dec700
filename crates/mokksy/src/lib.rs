//! Mokksy: a programmable mock HTTP server for tests.
//!
//! Register mappings (a request specification plus a responder) on a
//! [`MockServer`], point the client under test at it and verify afterwards
//! that every mapping was used. Responses can be static, delayed, chunked
//! streams or Server-Sent-Events, which makes the server a good stand-in for
//! streaming LLM APIs.
//!
//! ```no_run
//! use mokksy::{MockServer, RequestSpecification, ResponseDefinition};
//!
//! # async fn demo() -> mokksy::Result<()> {
//! let server = MockServer::start_default().await?;
//! server
//!     .mapping(RequestSpecification::builder().get().path("/health").build()?)
//!     .respond_with(|_| ResponseDefinition::ok().body("ok"));
//!
//! // ... exercise the client against server.base_url() ...
//!
//! server.verify_no_unmatched_requests()?;
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod metrics;
pub mod request;
pub mod response;
pub mod server;

pub use config::{Config, MappingConfig, ServerConfig, ShutdownConfig};
pub use error::{MokksyError, Result, StreamError};
pub use mapping::{CallRecord, MappingHandle, MappingId, MappingOptions, MappingSummary};
pub use request::{CapturedRequest, RequestSpecification, DEFAULT_PRIORITY};
pub use response::{
    ChunkResult, ChunkSource, ResponseDefinition, SseEvent, StreamItem, StreamSpec, DONE_SENTINEL,
};
pub use server::{BuildingStep, MockServer};
