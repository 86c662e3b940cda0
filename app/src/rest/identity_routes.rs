use super::{build_response, build_response_with_status, ApiState};
use crate::error::ApiError;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use warp::http::StatusCode;
use warp::{Filter, Reply};

pub fn routes(
    state: &Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    register_identity(state.clone()).or(delete_identity(state.clone()))
}

/// POST /api/identities
///
/// Registers the flower power account of an owner
///
/// The access token is checked against the source before it is stored.
/// Returns 202 with a `RegisterResponseDto`, the devices get indexed in the
/// background.
fn register_identity(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::post())
        .and(warp::path!("api" / "identities"))
        .and(warp::body::content_length_limit(4096))
        .and(warp::body::json())
        .and_then(
            |state: Arc<ApiState>, body: dto::RegisterRequestDto| async move {
                let resp = register(&state, body).await;
                build_response_with_status(resp, StatusCode::ACCEPTED)
            },
        )
        .boxed()
}

/// DELETE /api/identities/:owner_id
///
/// Removes the identity and the sync state of its devices
///
/// Returns 204, or 404 if the owner is unknown
fn delete_identity(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || state.clone())
        .and(warp::delete())
        .and(warp::path!("api" / "identities" / i64))
        .and_then(|state: Arc<ApiState>, owner_id: i64| async move {
            match state.store.delete_identity(owner_id).await {
                Ok(true) => {
                    info!(owner_id, "Deleted identity");
                    Ok(StatusCode::NO_CONTENT.into_response())
                }
                Ok(false) => build_response::<()>(Err(ApiError::NotFound(format!(
                    "identity {}",
                    owner_id
                )))),
                Err(e) => build_response::<()>(Err(e.into())),
            }
        })
        .boxed()
}

async fn register(
    state: &ApiState,
    body: dto::RegisterRequestDto,
) -> Result<dto::RegisterResponseDto, ApiError> {
    if body.access_token.trim().is_empty() {
        return Err(ApiError::ArgumentError(
            "access_token must be supplied".to_owned(),
        ));
    }

    let user = state.source.user(&body.access_token).await?;
    let locations = state.source.locations(&body.access_token).await?;
    // claimed right away when indexed here, so the scheduler skips it
    let identity = state
        .store
        .register_identity(body.owner_id, &body.access_token, state.indexer.is_some())
        .await?;
    info!(
        owner_id = identity.owner_id,
        locations = locations.len(),
        "Registered identity"
    );

    if let Some(indexer) = state.indexer.clone() {
        let identity = identity.clone();
        let span = info_span!("onboard", owner_id = identity.owner_id);
        state.tasks.spawn(
            async move {
                if let Err(e) = indexer.index_identity(&identity).await {
                    warn!(error = %e, "Failed indexing new identity");
                }
            }
            .instrument(span),
        );
    }

    Ok(dto::RegisterResponseDto {
        owner_id: identity.owner_id,
        parrot_id: user.parrot_id,
        total_things: locations.len(),
    })
}

///
/// DTO
///
pub mod dto {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterRequestDto {
        pub owner_id: i64,
        pub access_token: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterResponseDto {
        pub owner_id: i64,
        pub parrot_id: String,
        pub total_things: usize,
    }
}
