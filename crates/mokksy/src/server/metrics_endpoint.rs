//! Standalone Prometheus scrape endpoint.

use crate::metrics::collect_metrics;
use crate::response::body::{full, MockBody};
use crate::response::builder::{json_response, ResponseBuilder};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Serves `GET /metrics` in the Prometheus text format.
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Run until the task is dropped or accepting fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Metrics listening on http://{}/metrics", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let service = service_fn(route);
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }
}

async fn route(req: Request<Incoming>) -> Result<Response<MockBody>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => ResponseBuilder::new(StatusCode::OK)
            .header("Content-Type", "text/plain; version=0.0.4")
            .build(full(collect_metrics())),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({ "error": "Not found" }),
        ),
    };
    Ok(response)
}
