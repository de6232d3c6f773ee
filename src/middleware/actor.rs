// middleware/actor.rs
//
// Identity verification happens upstream in the auth collaborator; by the
// time a request reaches the core, the gateway has already validated the
// caller and stamped the request with their id. This middleware resolves
// that id to a user row and attaches it for handlers.
use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::IntoResponse, Extension};
use serde::{Deserialize, Serialize};

use crate::{
    db::userdb::UserExt,
    error::{ErrorMessage, HttpError},
    models::usermodel::User,
    AppState,
};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthenticatedActor {
    pub user: User,
}

pub async fn actor(
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let actor_header = req
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());

    let actor_id = actor_header
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::ActorNotProvided.to_string()))?;

    let user_id = uuid::Uuid::parse_str(&actor_id)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidActorId.to_string()))?;

    let user = app_state
        .db_client
        .get_user(user_id)
        .await
        .map_err(|_| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    let user = user
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(AuthenticatedActor { user });

    Ok(next.run(req).await)
}
