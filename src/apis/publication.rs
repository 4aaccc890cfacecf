use crate::{Coordinator, CoordinatorError};

use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

/// A non-authoritative snapshot of the ceremony for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyStatus {
    pub chain_head: u64,
    pub queue_length: usize,
    pub phase: String,
    pub status: String,
}

impl CeremonyStatus {
    pub fn load(coordinator: &Coordinator) -> Result<Self, CoordinatorError> {
        Ok(Self {
            chain_head: coordinator.chain_head()?,
            queue_length: coordinator.queue_length()?,
            phase: coordinator.phase()?.to_string(),
            status: coordinator.status()?.to_string(),
        })
    }
}

/// Returns the route serving published artifacts by exact filename at `/artifacts/<filename>`.
pub fn artifacts_route(coordinator: &Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("artifacts")
        .and(warp::get())
        .and(warp::fs::dir(coordinator.environment().keys_directory()))
}

/// Returns the route serving the audit log at `/log`.
pub fn log_route(coordinator: &Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("log")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::fs::file(coordinator.environment().audit_log_path()))
}

/// Returns the route serving the ceremony status at `/status`.
pub fn status_route(coordinator: Coordinator) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || match CeremonyStatus::load(&coordinator) {
            Ok(status) => warp::reply::with_status(warp::reply::json(&status), StatusCode::OK),
            Err(error) => warp::reply::with_status(
                warp::reply::json(&serde_json::json!({ "error": error.to_string() })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        })
}

/// Returns the liveness route at `/ping`.
pub fn ping_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ping").and(warp::path::end()).map(|| "pong")
}
