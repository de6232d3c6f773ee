use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;
use crate::models::offermodel::OfferStatus;
use crate::service::offer_service::OfferAction;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User {0} is not authorized to perform this action on {1}")]
    Unauthorized(Uuid, Uuid),

    #[error("Offer {0} does not allow {1:?} from status {2:?}")]
    InvalidTransition(Uuid, OfferAction, OfferStatus),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("A live offer already exists for job {job_posting_id} by applicant {applicant_id}")]
    DuplicateOffer {
        job_posting_id: Uuid,
        applicant_id: Uuid,
    },

    #[error("Offer price {offered} is below the minimum of {minimum}")]
    PriceTooLow { offered: i64, minimum: i64 },

    #[error("Chat {0} is not active: messages are only allowed while the offer is accepted")]
    ChatNotActive(Uuid),

    #[error("Offer {0} not found")]
    OfferNotFound(Uuid),

    #[error("Chat session {0} not found")]
    ChatNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Job posting {0} not found")]
    JobPostingNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_, _) => StatusCode::UNAUTHORIZED,

            ServiceError::InvalidTransition(_, _, _)
            | ServiceError::InvalidAmount(_)
            | ServiceError::PriceTooLow { .. }
            | ServiceError::ChatNotActive(_) => StatusCode::BAD_REQUEST,

            ServiceError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,

            ServiceError::DuplicateOffer { .. } => StatusCode::CONFLICT,

            ServiceError::OfferNotFound(_)
            | ServiceError::ChatNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::JobPostingNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            // Generic wording so unauthorized actors cannot probe which
            // entities exist.
            ServiceError::OfferNotFound(_)
            | ServiceError::ChatNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::JobPostingNotFound(_) => HttpError::not_found("Resource not found"),

            ServiceError::Unauthorized(_, _) => {
                HttpError::unauthorized("Not authorized to perform this action")
            }

            ServiceError::InsufficientFunds { .. } => {
                HttpError::payment_required(error.to_string())
            }

            ServiceError::DuplicateOffer { .. } => HttpError::conflict(error.to_string()),

            ServiceError::InvalidTransition(_, _, _)
            | ServiceError::InvalidAmount(_)
            | ServiceError::PriceTooLow { .. }
            | ServiceError::ChatNotActive(_) => HttpError::bad_request(error.to_string()),

            ServiceError::Database(e) => {
                tracing::error!("database error: {}", e);
                HttpError::server_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants_do_not_leak_ids() {
        let id = Uuid::new_v4();
        for err in [
            ServiceError::OfferNotFound(id),
            ServiceError::ChatNotFound(id),
            ServiceError::UserNotFound(id),
            ServiceError::JobPostingNotFound(id),
        ] {
            let http: HttpError = err.into();
            assert_eq!(http.status, StatusCode::NOT_FOUND);
            assert!(!http.message.contains(&id.to_string()));
        }
    }

    #[test]
    fn insufficient_funds_maps_to_payment_required() {
        let err = ServiceError::InsufficientFunds {
            required: 5000,
            available: 1000,
        };
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn duplicate_offer_maps_to_conflict() {
        let err = ServiceError::DuplicateOffer {
            job_posting_id: Uuid::new_v4(),
            applicant_id: Uuid::new_v4(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
