// handler/offers.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::Stream;
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::offerdb::OfferExt,
    dtos::offerdtos::{AcceptResponseDto, OfferListQuery, OfferResponseDto, SubmitOfferDto},
    error::HttpError,
    middleware::AuthenticatedActor,
    service::{
        error::ServiceError,
        events::{offer_topic, CoreEvent},
    },
    AppState,
};

pub fn offer_handler() -> Router {
    Router::new()
        .route("/", post(submit_offer).get(list_offers))
        .route("/:offer_id", get(get_offer))
        .route("/:offer_id/accept", post(accept_offer))
        .route("/:offer_id/reject", post(reject_offer))
        .route("/:offer_id/complete", post(complete_offer))
        .route("/:offer_id/cancel", post(cancel_offer))
        .route("/:offer_id/events", get(offer_events))
}

pub async fn submit_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Json(body): Json<SubmitOfferDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let offer = app_state
        .offer_service
        .submit_offer(
            body.job_posting_id,
            actor.user.id,
            body.title,
            body.description,
            body.offer_price,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": OfferResponseDto { offer }
    })))
}

pub async fn list_offers(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Query(query): Query<OfferListQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100) as i64;
    let offset = ((page - 1) as i64) * limit;

    let offers = match query.role.as_deref() {
        Some("advertiser") => {
            app_state
                .db_client
                .list_offers_by_advertiser(actor.user.id, limit, offset)
                .await
        }
        _ => {
            app_state
                .db_client
                .list_offers_by_applicant(actor.user.id, limit, offset)
                .await
        }
    }
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": offers
    })))
}

pub async fn get_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let offer = app_state
        .db_client
        .get_offer(offer_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    // Non-participants get the same answer as a missing offer.
    if offer.advertiser_id != actor.user.id && offer.applicant_id != actor.user.id {
        return Err(HttpError::not_found("Resource not found"));
    }

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": OfferResponseDto { offer }
    })))
}

pub async fn accept_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (offer, chat_session) = app_state.offer_service.accept(offer_id, actor.user.id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": AcceptResponseDto { offer, chat_session }
    })))
}

pub async fn reject_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let offer = app_state.offer_service.reject(offer_id, actor.user.id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": OfferResponseDto { offer }
    })))
}

pub async fn complete_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let offer = app_state
        .offer_service
        .complete(offer_id, actor.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": OfferResponseDto { offer }
    })))
}

pub async fn cancel_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let offer = app_state.offer_service.cancel(offer_id, actor.user.id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": OfferResponseDto { offer }
    })))
}

/// Live tail of status changes for one offer. Closing the connection drops
/// the receiver and frees the subscription.
pub async fn offer_events(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    let offer = app_state
        .db_client
        .get_offer(offer_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    if offer.advertiser_id != actor.user.id && offer.applicant_id != actor.user.id {
        return Err(ServiceError::Unauthorized(actor.user.id, offer_id).into());
    }

    let rx = app_state.events.subscribe(&offer_topic(offer_id)).await;
    Ok(Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()))
}

/// Shared by the offer and chat SSE endpoints: lagged subscribers skip
/// ahead (consumers tolerate gaps via re-fetch), a closed channel ends the
/// stream.
pub fn event_stream(
    rx: broadcast::Receiver<CoreEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().json_data(&event) {
                    Ok(sse_event) => return Some((Ok::<Event, Infallible>(sse_event), rx)),
                    Err(_) => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("sse subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}
