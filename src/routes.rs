// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{chat::chat_handler, ledger::ledger_handler, offers::offer_handler},
    middleware::actor,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/offers", offer_handler().layer(middleware::from_fn(actor)))
        .nest("/ledger", ledger_handler().layer(middleware::from_fn(actor)))
        .nest("/chats", chat_handler().layer(middleware::from_fn(actor)))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
