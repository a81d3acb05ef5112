use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use mercato_core::StoreError;
use mercato_sales::SaleError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CustomerNotFound(_)
            | StoreError::ProductNotFound(_)
            | StoreError::SaleNotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::InsufficientStock { .. } | StoreError::BarcodeTaken(_) => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Backend(inner) => AppError::Internal(inner),
        }
    }
}

impl From<SaleError> for AppError {
    /// Create-time failures answer 400 with the specific reason in the
    /// body; lookups answer 404; guard refusals answer 409.
    fn from(err: SaleError) -> Self {
        match err {
            SaleError::SaleNotFound(_) => AppError::NotFound(err.to_string()),
            SaleError::CustomerHasSales(_) | SaleError::ProductInUse(_) => {
                AppError::Conflict(err.to_string())
            }
            SaleError::Store(StoreError::Backend(inner)) => AppError::Internal(inner),
            SaleError::Store(inner) => AppError::from(inner),
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}
