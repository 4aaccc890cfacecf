pub mod publication;
pub use publication::*;

pub mod session;
pub use session::*;

use crate::Coordinator;

use warp::{Filter, Rejection, Reply};

/// Returns every route of the ceremony server.
pub fn routes(
    coordinator: Coordinator,
    sessions: Sessions,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    session_route(coordinator.clone(), sessions)
        .or(artifacts_route(&coordinator))
        .or(log_route(&coordinator))
        .or(status_route(coordinator))
        .or(ping_route())
        .with(warp::trace::request())
}
