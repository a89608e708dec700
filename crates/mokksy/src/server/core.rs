//! Mock server lifecycle and test-facing API.

use super::building::BuildingStep;
use super::handler::{handle_request, ServerState};
use crate::config::{MappingConfig, ServerConfig, ShutdownConfig};
use crate::error::{MokksyError, Result};
use crate::mapping::{CallRecord, Mapping, MappingHandle, MappingOptions, MappingSummary};
use crate::request::{CapturedRequest, RequestSpecification};
use crate::response::ResponseDefinition;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
struct ShutdownSignal {
    grace_period: Duration,
    timeout: Duration,
}

/// A running mock HTTP server.
///
/// Each instance owns its own mappings and call records; nothing is shared
/// between servers. Dropping the server signals shutdown without waiting
/// for it; call [`shutdown`](Self::shutdown) to wait for connections to
/// drain.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_config: ShutdownConfig,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    serve_task: Mutex<Option<JoinHandle<()>>>,
}

impl MockServer {
    /// Bind and start serving.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let requested = config.socket_addr().await?;
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| MokksyError::Bind(requested, e))?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ServerState::new(config.verbose));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let serve_task = tokio::spawn(serve(listener, Arc::clone(&state), shutdown_rx));

        info!("Mock server listening on http://{}", addr);
        Ok(Self {
            addr,
            state,
            shutdown_config: config.shutdown,
            shutdown_tx,
            serve_task: Mutex::new(Some(serve_task)),
        })
    }

    /// Start on an ephemeral localhost port with default settings.
    pub async fn start_default() -> Result<Self> {
        Self::start(ServerConfig::default()).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }

    /// Register a mapping with default options.
    pub fn register<F>(&self, specification: RequestSpecification, responder: F) -> MappingHandle
    where
        F: Fn(&CapturedRequest) -> ResponseDefinition + Send + Sync + 'static,
    {
        self.register_with(specification, MappingOptions::default(), responder)
    }

    pub fn register_with<F>(
        &self,
        specification: RequestSpecification,
        options: MappingOptions,
        responder: F,
    ) -> MappingHandle
    where
        F: Fn(&CapturedRequest) -> ResponseDefinition + Send + Sync + 'static,
    {
        let mapping = self
            .state
            .registry
            .register(specification, options, Arc::new(responder));
        MappingHandle::new(mapping.id)
    }

    /// Start configuring a mapping; finish with one of the `respond_*` calls.
    pub fn mapping(&self, specification: RequestSpecification) -> BuildingStep<'_> {
        BuildingStep::new(self, specification)
    }

    /// Register declarative mappings, typically from a config file.
    pub fn load(&self, mappings: &[MappingConfig]) -> Result<Vec<MappingHandle>> {
        let compiled = mappings
            .iter()
            .map(MappingConfig::compile)
            .collect::<Result<Vec<_>>>()?;

        Ok(compiled
            .into_iter()
            .map(|(specification, options, responder)| {
                let mapping = self
                    .state
                    .registry
                    .register(specification, options, responder);
                MappingHandle::new(mapping.id)
            })
            .collect())
    }

    /// Remove a mapping. Returns whether it was still registered.
    pub fn remove(&self, handle: MappingHandle) -> bool {
        self.state.registry.remove(handle.id())
    }

    pub fn mappings(&self) -> Vec<MappingSummary> {
        self.state.registry.summaries()
    }

    /// Every request served so far, oldest first.
    pub fn calls(&self) -> Vec<Arc<CallRecord>> {
        self.state.registry.calls()
    }

    pub fn match_count(&self, handle: MappingHandle) -> usize {
        self.state.registry.match_count(handle.id())
    }

    /// Mappings that have not served any request.
    pub fn unmatched_mappings(&self) -> Vec<Arc<Mapping>> {
        self.state.registry.unmatched_mappings()
    }

    /// Specifications of mappings that have not served any request.
    pub fn find_all_unmatched(&self) -> Vec<RequestSpecification> {
        self.unmatched_mappings()
            .iter()
            .map(|m| m.specification.clone())
            .collect()
    }

    /// Requests that matched no mapping.
    pub fn unmatched_requests(&self) -> Vec<Arc<CallRecord>> {
        self.state.registry.unmatched_requests()
    }

    /// Fail if any registered mapping never served a request.
    pub fn verify_no_unmatched_requests(&self) -> Result<()> {
        let unmatched = self.unmatched_mappings();
        if unmatched.is_empty() {
            return Ok(());
        }
        Err(MokksyError::UnmatchedMappings(
            unmatched.iter().map(|m| m.to_string()).collect(),
        ))
    }

    /// Panicking form of [`verify_no_unmatched_requests`](Self::verify_no_unmatched_requests),
    /// for use at test teardown.
    #[track_caller]
    pub fn assert_no_unmatched_requests(&self) {
        if let Err(e) = self.verify_no_unmatched_requests() {
            panic!("{e}");
        }
    }

    /// Forget recorded calls; mappings stay registered.
    pub fn reset_match_counts(&self) {
        self.state.registry.reset_match_counts();
    }

    /// Shut down using the configured grace period and timeout.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with(
            self.shutdown_config.grace_period(),
            self.shutdown_config.timeout(),
        )
        .await
    }

    /// Stop accepting connections and wait for open ones to finish.
    ///
    /// Open connections finish their in-flight responses for up to
    /// `grace_period`; whatever is still running then is aborted, and the
    /// call returns once the server task ends or `timeout` elapses.
    pub async fn shutdown_with(&self, grace_period: Duration, timeout: Duration) -> Result<()> {
        if timeout < grace_period {
            return Err(MokksyError::InvalidArgument(format!(
                "shutdown timeout ({timeout:?}) must be >= grace period ({grace_period:?})"
            )));
        }

        let Some(task) = self.serve_task.lock().take() else {
            debug!("Mock server on {} already shut down", self.addr);
            return Ok(());
        };

        info!("Mock server on {} shutting down", self.addr);
        // The serve task may already have exited; there is nobody to notify then.
        let _ = self.shutdown_tx.send(ShutdownSignal {
            grace_period,
            timeout,
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Mock server task on {} failed: {}", self.addr, e);
                Ok(())
            }
            Err(_) => {
                warn!("Mock server on {} did not stop within {:?}", self.addr, timeout);
                Ok(())
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if self.serve_task.lock().is_some() {
            let _ = self.shutdown_tx.send(ShutdownSignal {
                grace_period: self.shutdown_config.grace_period(),
                timeout: self.shutdown_config.timeout(),
            });
        }
    }
}

async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) {
    let (connection_shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut connections = JoinSet::new();

    let signal = loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        let shutdown = connection_shutdown_tx.subscribe();
                        connections.spawn(serve_connection(stream, addr, state, shutdown));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            signal = shutdown_rx.recv() => {
                match signal {
                    Ok(signal) => break signal,
                    // Sender gone: the server handle was dropped without a signal.
                    Err(_) => break ShutdownSignal {
                        grace_period: Duration::ZERO,
                        timeout: Duration::ZERO,
                    },
                }
            }
        }
    };
    drop(listener);

    let _ = connection_shutdown_tx.send(());
    let drained = tokio::time::timeout(signal.grace_period, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            "Aborting {} connection(s) still open after {:?}",
            connections.len(),
            signal.grace_period
        );
        connections.abort_all();
        let remaining = signal.timeout.saturating_sub(signal.grace_period);
        let _ = tokio::time::timeout(remaining, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
    }
    debug!("Mock server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state, addr).await }
    });

    let connection = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error from {}: {}", addr, e);
            }
        }
        _ = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                debug!("Connection error from {} during shutdown: {}", addr, e);
            }
        }
    }
}
