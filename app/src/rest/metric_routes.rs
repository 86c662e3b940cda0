use super::{build_response, ApiState};
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    state: &Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    health(state.clone()).or(metrics_text(state.clone()))
}

/// GET /api/health
fn health(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::get())
        .and(warp::path!("api" / "health"))
        .and_then(|state: Arc<ApiState>| async move {
            let ret = dto::HealthyDto {
                healthy: true,
                indexer: state.indexer.is_some(),
                database_state: state.store.check_db().await,
                identities: state.store.identity_stats().await.ok(),
            };
            build_response(Ok(ret))
        })
        .boxed()
}

/// GET /metrics
fn metrics_text(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::get())
        .and(warp::path!("metrics"))
        .map(|state: Arc<ApiState>| {
            warp::reply::with_header(
                state.metrics.render(),
                "content-type",
                "text/plain; version=0.0.4",
            )
        })
        .boxed()
}

mod dto {
    use crate::store::IdentityStats;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    pub struct HealthyDto {
        pub healthy: bool,
        pub indexer: bool,
        pub database_state: String,
        pub identities: Option<IdentityStats>,
    }
}
