use super::query::DateQuery;
use super::{build_response, ApiState};
use crate::error::ApiError;
use chrono::Duration;
use std::sync::Arc;
use warp::Filter;

/// Longest range a single request may cover
const MAX_RANGE_DAYS: i64 = 10;

pub fn routes(
    state: &Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    get_timeseries(state.clone())
}

/// POST /api/timeseries
///
/// Reads the observations of several things at once
///
/// Returns a `TimeseriesResponseDto` with one entry per requested thing, in
/// request order
fn get_timeseries(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::post())
        .and(warp::path!("api" / "timeseries"))
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and_then(
            |state: Arc<ApiState>, body: dto::TimeseriesRequestDto| async move {
                let resp = query_timeseries(&state, body).await;
                build_response(resp)
            },
        )
        .boxed()
}

async fn query_timeseries(
    state: &ApiState,
    body: dto::TimeseriesRequestDto,
) -> Result<dto::TimeseriesResponseDto, ApiError> {
    if body.things.is_empty() {
        return Err(ApiError::ArgumentError("things must not be empty".to_owned()));
    }
    if !body.range.is_valid() {
        return Err(ApiError::ArgumentError("from must be before to".to_owned()));
    }
    if body.range.is_larger_than(Duration::days(MAX_RANGE_DAYS)) {
        return Err(ApiError::ArgumentError(format!(
            "maximum permitted range is {} days",
            MAX_RANGE_DAYS
        )));
    }
    let ascending = match body.order.as_deref() {
        None | Some("asc") => true,
        Some("desc") => false,
        Some(other) => {
            return Err(ApiError::ArgumentError(format!(
                "order must be asc or desc, got {}",
                other
            )))
        }
    };

    // dropped together with the request, aborting all reads
    let things = state
        .thingful
        .get_data(
            &body.things,
            body.range.from(),
            body.range.to(),
            ascending,
            &state.shutdown.child_token(),
        )
        .await?;
    Ok(dto::TimeseriesResponseDto { data: things })
}

///
/// DTO
///
pub mod dto {
    use super::DateQuery;
    use crate::thingful::Thing;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TimeseriesRequestDto {
        pub things: Vec<String>,
        #[serde(flatten)]
        pub range: DateQuery,
        #[serde(default)]
        pub order: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TimeseriesResponseDto {
        pub data: Vec<Thing>,
    }
}
