//! Questline API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use questline_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The catalog or the initial session could not be set up.
    #[error("session setup error: {0}")]
    Domain(#[from] DomainError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::UnknownPeer(_) => (StatusCode::NOT_FOUND, "unknown_peer"),
            DomainError::QuestIndexOutOfRange { .. } => {
                (StatusCode::NOT_FOUND, "quest_index_out_of_range")
            }
            DomainError::ObjectiveIndexOutOfRange { .. } => {
                (StatusCode::NOT_FOUND, "objective_index_out_of_range")
            }
            DomainError::NotAuthority(_) => (StatusCode::CONFLICT, "not_authority"),
            DomainError::EmptyQuest(_) => (StatusCode::BAD_REQUEST, "empty_quest"),
            DomainError::Configuration(_) => (StatusCode::BAD_REQUEST, "configuration_error"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use questline_core::peer::PeerId;

    fn status_of(err: DomainError) -> StatusCode {
        let response = ApiError(err).into_response();
        response.status()
    }

    #[test]
    fn test_unknown_peer_maps_to_404() {
        assert_eq!(
            status_of(DomainError::UnknownPeer(PeerId(7))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_index_out_of_range_maps_to_404() {
        assert_eq!(
            status_of(DomainError::QuestIndexOutOfRange { index: 9, len: 4 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::ObjectiveIndexOutOfRange {
                quest_index: 0,
                index: 5,
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_not_authority_maps_to_409() {
        assert_eq!(
            status_of(DomainError::NotAuthority(PeerId(2))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(DomainError::Validation("bad input".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(DomainError::EmptyQuest(1)), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("transport down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
