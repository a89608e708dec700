//! Fluent mapping registration.

use super::core::MockServer;
use crate::mapping::{MappingHandle, MappingOptions};
use crate::request::{CapturedRequest, RequestSpecification};
use crate::response::{ResponseDefinition, StreamSpec};

/// A mapping whose request side is fixed and whose response is still open.
///
/// ```no_run
/// # async fn demo() -> mokksy::Result<()> {
/// use mokksy::{MockServer, RequestSpecification, StreamSpec};
///
/// let server = MockServer::start_default().await?;
/// server
///     .mapping(RequestSpecification::builder().post().path("/v1/chat").build()?)
///     .respond_with_sse(|_| StreamSpec::chunks(["{\"delta\":\"Hi\"}"]).done_sentinel());
/// # Ok(())
/// # }
/// ```
#[must_use = "a mapping is only registered by one of the respond_* methods"]
pub struct BuildingStep<'a> {
    server: &'a MockServer,
    specification: RequestSpecification,
    options: MappingOptions,
}

impl<'a> BuildingStep<'a> {
    pub(crate) fn new(server: &'a MockServer, specification: RequestSpecification) -> Self {
        Self {
            server,
            specification,
            options: MappingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MappingOptions) -> Self {
        self.options = options;
        self
    }

    /// Serve a single request, then remove the mapping.
    pub fn once(mut self) -> Self {
        self.options.remove_after_match = true;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.options.verbose = true;
        self
    }

    pub fn respond_with<F>(self, responder: F) -> MappingHandle
    where
        F: Fn(&CapturedRequest) -> ResponseDefinition + Send + Sync + 'static,
    {
        self.server
            .register_with(self.specification, self.options, responder)
    }

    /// Respond 200 with a chunked stream built per request.
    pub fn respond_with_stream<F>(self, stream: F) -> MappingHandle
    where
        F: Fn(&CapturedRequest) -> StreamSpec + Send + Sync + 'static,
    {
        self.respond_with(move |request| ResponseDefinition::ok().stream(stream(request)))
    }

    /// Like [`respond_with_stream`](Self::respond_with_stream), with SSE framing forced on.
    pub fn respond_with_sse<F>(self, stream: F) -> MappingHandle
    where
        F: Fn(&CapturedRequest) -> StreamSpec + Send + Sync + 'static,
    {
        self.respond_with_stream(move |request| stream(request).sse())
    }
}
