//! HTTP serving: lifecycle, dispatch and the metrics endpoint.

mod building;
mod core;
pub mod handler;
mod metrics_endpoint;

pub use self::core::MockServer;
pub use building::BuildingStep;
pub use handler::{dispatch, ServerState};
pub use metrics_endpoint::MetricsServer;
