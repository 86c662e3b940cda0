use crate::error::{ApiError, ApiErrorKind, SinkError};
use crate::flowerpower::Source;
use crate::indexer::Indexer;
use crate::metrics::PrometheusMetrics;
use crate::store::Store;
use crate::thingful::Thingful;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::{Filter, Reply};

mod identity_routes;
mod metric_routes;
mod query;
mod timeseries_routes;


/// Everything the routes work on
pub struct ApiState {
    pub thingful: Arc<Thingful>,
    pub source: Arc<dyn Source>,
    pub store: Arc<dyn Store>,
    /// Indexes freshly registered identities, `None` when indexing is off
    pub indexer: Option<Arc<Indexer>>,
    pub metrics: Arc<PrometheusMetrics>,
    pub shutdown: CancellationToken,
    /// Background work started by requests, drained before exiting
    pub tasks: TaskTracker,
}

pub fn routes(
    state: &Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    timeseries_routes::routes(state)
        .or(identity_routes::routes(state))
        .or(metric_routes::routes(state))
        .with(warp::trace::request())
}

/// Serves the api until the state's shutdown token fires, open requests are
/// drained first.
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<(), warp::Error> {
    let shutdown = state.shutdown.clone();
    let (addr, server) = warp::serve(routes(&state)).try_bind_with_graceful_shutdown(
        ([0, 0, 0, 0], port),
        async move { shutdown.cancelled().await },
    )?;

    info!(%addr, "Starting webserver");
    server.await;
    info!("Webserver stopped");
    Ok(())
}

fn build_response<T: serde::Serialize>(
    resp: Result<T, ApiError>,
) -> Result<warp::reply::Response, warp::Rejection> {
    build_response_with_status(resp, StatusCode::OK)
}

fn build_response_with_status<T: serde::Serialize>(
    resp: Result<T, ApiError>,
    success: StatusCode,
) -> Result<warp::reply::Response, warp::Rejection> {
    let err = match resp {
        Ok(data) => {
            return Ok(warp::reply::with_status(warp::reply::json(&data), success).into_response())
        }
        Err(err) => err,
    };

    match err.kind() {
        ApiErrorKind::User => warn!("{}", err),
        ApiErrorKind::Internal => error!("{}", err),
    }
    let status = match &err {
        ApiError::ArgumentError(_) | ApiError::Upstream(SinkError::TooManyThings(..)) => {
            StatusCode::BAD_REQUEST
        }
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Upstream(_) | ApiError::Source(_) => StatusCode::BAD_GATEWAY,
        ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = dto::ErrorResponseDto {
        error: format!("{}", err),
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}

mod dto {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorResponseDto {
        pub error: String,
    }
}
