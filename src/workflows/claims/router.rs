use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;

use super::clock::Clock;
use super::domain::{ClaimRequest, ClaimToken};
use super::notify::NoticePublisher;
use super::repository::ListingStore;
use super::service::{ClaimError, ClaimService};

/// Router builder exposing the claim landing page state and the claim
/// submission endpoint.
pub fn claim_router<S, N, C>(service: Arc<ClaimService<S, N, C>>) -> Router
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/claim/:token",
            get(preview_handler::<S, N, C>).post(resolve_handler::<S, N, C>),
        )
        .with_state(service)
}

pub(crate) async fn preview_handler<S, N, C>(
    State(service): State<Arc<ClaimService<S, N, C>>>,
    Path(token): Path<String>,
) -> Response
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
    C: Clock + 'static,
{
    match service.preview(&ClaimToken(token)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => claim_error_response(error),
    }
}

pub(crate) async fn resolve_handler<S, N, C>(
    State(service): State<Arc<ClaimService<S, N, C>>>,
    Path(token): Path<String>,
    axum::Json(request): axum::Json<ClaimRequest>,
) -> Response
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
    C: Clock + 'static,
{
    match service.resolve(&ClaimToken(token), request) {
        Ok(listing) => {
            let payload = json!({
                "listing_id": listing.id.0,
                "status": listing.status.label(),
                "claimed_at": listing.claimed_at,
                "redirect_to": format!("/listings/{}", listing.id.0),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => claim_error_response(error),
    }
}

fn claim_error_response(error: ClaimError) -> Response {
    let status = match &error {
        ClaimError::TokenNotFound => StatusCode::NOT_FOUND,
        ClaimError::TokenExpired => StatusCode::GONE,
        ClaimError::AlreadyClaimed => StatusCode::CONFLICT,
        ClaimError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ClaimError::Store(_) | ClaimError::Notice(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
