// dtos/offerdtos.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{chatmodel::ChatSession, offermodel::Offer};

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitOfferDto {
    pub job_posting_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,

    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,

    /// In cents; the minimum is enforced by the service against its
    /// configured floor.
    pub offer_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct OfferListQuery {
    /// "advertiser" (offers received on my postings) or "applicant"
    /// (offers I sent). Defaults to applicant.
    pub role: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OfferResponseDto {
    pub offer: Offer,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponseDto {
    pub offer: Offer,
    pub chat_session: ChatSession,
}
