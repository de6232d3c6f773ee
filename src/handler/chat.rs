// handler/chat.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Extension, Json, Router,
};
use futures::Stream;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{chatdb::ChatExt, offerdb::OfferExt},
    dtos::chatdtos::{
        MessageListQuery, MessagesResponseDto, PaginationQuery, PostMessageDto,
        SessionResponseDto,
    },
    error::HttpError,
    handler::offers::event_stream,
    middleware::AuthenticatedActor,
    models::chatmodel::{ChatSession, MessageKind},
    service::{error::ServiceError, events::chat_topic, file_store::validate_media_ref},
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route("/", get(list_sessions))
        .route("/by-offer/:offer_id", get(get_session_by_offer))
        .route("/:session_id", get(get_session))
        .route("/:session_id/messages", get(list_messages).post(post_message))
        .route("/:session_id/events", get(chat_events))
}

async fn load_session_checked(
    app_state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<ChatSession, HttpError> {
    let session = app_state
        .db_client
        .get_session(session_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    // Same response as a missing session so outsiders learn nothing.
    if !session.is_participant(user_id) {
        return Err(HttpError::not_found("Resource not found"));
    }

    Ok(session)
}

pub async fn list_sessions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(20).min(100) as i64;
    let offset = ((page - 1) as i64) * limit;

    let sessions = app_state
        .db_client
        .list_sessions_for_user(actor.user.id, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": sessions
    })))
}

/// Session details with the authoritative offer status, so both clients
/// render the same state no matter how stale their local copy is.
pub async fn get_session(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let session = load_session_checked(&app_state, session_id, actor.user.id).await?;

    let offer = app_state
        .db_client
        .get_offer(session.offer_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::server_error("Chat session references a missing offer"))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": SessionResponseDto {
            session,
            offer_status: offer.status,
        }
    })))
}

/// Lookup by offer id: after an accept, the client holds the offer but may
/// not have stored the session id.
pub async fn get_session_by_offer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(offer_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state
        .db_client
        .get_session_by_offer(offer_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    if !session.is_participant(actor.user.id) {
        return Err(HttpError::not_found("Resource not found"));
    }

    let offer = app_state
        .db_client
        .get_offer(session.offer_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::server_error("Chat session references a missing offer"))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": SessionResponseDto {
            session,
            offer_status: offer.status,
        }
    })))
}

pub async fn post_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<PostMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let kind = body.kind.unwrap_or(MessageKind::Text);
    validate_media_ref(kind, body.media_ref.as_deref())
        .map_err(HttpError::bad_request)?;

    // The accepted-only gate lives inside the service transaction; clients
    // holding a stale "accepted" view get ChatNotActive from there.
    let message = app_state
        .offer_service
        .post_message(session_id, actor.user.id, kind, body.content, body.media_ref)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": message
    })))
}

pub async fn list_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let session = load_session_checked(&app_state, session_id, actor.user.id).await?;

    let limit = query.limit.unwrap_or(50).min(200) as i64;
    let after = query
        .after
        .map(|ts| (ts, query.after_id.unwrap_or(Uuid::nil())));

    let messages = app_state
        .db_client
        .list_messages(session.id, after, limit)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": MessagesResponseDto::paginate(messages)
    })))
}

/// Live tail of new-message notifications for one session.
pub async fn chat_events(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Path(session_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    let session = app_state
        .db_client
        .get_session(session_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    if !session.is_participant(actor.user.id) {
        return Err(ServiceError::Unauthorized(actor.user.id, session_id).into());
    }

    let rx = app_state.events.subscribe(&chat_topic(session_id)).await;
    Ok(Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()))
}
