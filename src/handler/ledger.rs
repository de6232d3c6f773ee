// handler/ledger.rs
use std::sync::Arc;

use axum::{
    extract::Query,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::{ledgerdb::LedgerExt, offerdb::OfferExt},
    dtos::ledgerdtos::{BalanceResponseDto, LedgerQuery, LedgerSummaryDto, TopUpDto},
    error::HttpError,
    middleware::AuthenticatedActor,
    utils::currency::cents_to_dollars,
    AppState,
};

pub fn ledger_handler() -> Router {
    Router::new()
        .route("/balance", get(get_balance))
        .route("/topup", post(top_up))
        .route("/transactions", get(get_transactions))
        .route("/summary", get(get_summary))
}

pub async fn get_balance(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let balance = app_state
        .db_client
        .get_balance(actor.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": BalanceResponseDto {
            balance,
            balance_dollars: cents_to_dollars(balance),
        }
    })))
}

/// External trusted credit: the payment gateway already settled the funds.
pub async fn top_up(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Json(body): Json<TopUpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let entry = app_state
        .db_client
        .top_up(actor.user.id, body.amount, body.timezone)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::info!("user {} topped up {}", actor.user.id, body.amount);

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": entry
    })))
}

pub async fn get_transactions(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    Query(query): Query<LedgerQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).min(200) as i64;
    let offset = ((page - 1) as i64) * limit;

    let entries = app_state
        .db_client
        .get_ledger_entries(actor.user.id, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": entries
    })))
}

/// The accounting view: balance, transaction history and both sides of the
/// actor's offer activity in one response.
pub async fn get_summary(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let balance = app_state
        .db_client
        .get_balance(actor.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Resource not found"))?;

    let entries = app_state
        .db_client
        .get_ledger_entries(actor.user.id, 100, 0)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let offers_received = app_state
        .db_client
        .list_offers_by_advertiser(actor.user.id, 50, 0)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let offers_sent = app_state
        .db_client
        .list_offers_by_applicant(actor.user.id, 50, 0)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": LedgerSummaryDto {
            balance,
            entries,
            offers_received,
            offers_sent,
        }
    })))
}
