// error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    ActorNotProvided,
    InvalidActorId,
    UserNoLongerExist,
    PermissionDenied,
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ErrorMessage::ActorNotProvided => "You are not logged in, please provide an actor id",
            ErrorMessage::InvalidActorId => "Actor id is invalid",
            ErrorMessage::UserNoLongerExist => "User belonging to this actor no longer exists",
            ErrorMessage::PermissionDenied => "You are not allowed to perform this action",
        };
        write!(f, "{}", msg)
    }
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn payment_required(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::PAYMENT_REQUIRED)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::CONFLICT)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HttpError: {} ({})", self.message, self.status)
    }
}

impl std::error::Error for HttpError {}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status_label = if self.status.is_server_error() {
            "error"
        } else {
            "fail"
        };

        let body = Json(ErrorBody {
            status: status_label,
            message: self.message,
        });

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_map_to_expected_status() {
        assert_eq!(HttpError::bad_request("x").status, StatusCode::BAD_REQUEST);
        assert_eq!(HttpError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            HttpError::payment_required("x").status,
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(HttpError::not_found("x").status, StatusCode::NOT_FOUND);
        assert_eq!(HttpError::conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(
            HttpError::server_error("x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
