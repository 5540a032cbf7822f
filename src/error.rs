//! Crate-level error type for the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::rest::ApiError;
use crate::backup::TransportError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Invalid(_)) | AppError::Store(StoreError::EmptyUpdate) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Transport(TransportError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Transport(TransportError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::NOT_FOUND => ApiError::not_found(self.to_string()),
            StatusCode::BAD_REQUEST => ApiError::bad_request(self.to_string()),
            StatusCode::SERVICE_UNAVAILABLE => ApiError::unavailable(self.to_string()),
            _ => {
                tracing::error!(error = %self, "Request failed");
                ApiError::internal(self.to_string())
            }
        };
        (status, Json(body)).into_response()
    }
}
