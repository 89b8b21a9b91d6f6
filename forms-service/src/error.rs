//! Request-level error taxonomy.
//!
//! Two kinds are user-correctable and map to 4xx with actionable bodies;
//! persistence failures are the only server errors a submission can surface.
//! Notification failures never appear here: they are absorbed and logged by
//! the notifier.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::validate::FieldError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("too many requests")]
    RateLimited { retry_after: u64 },

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("storage error")]
    Persistence(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests. Please try again later.",
                    "retry_after": retry_after,
                })),
            )
                .into_response(),

            AppError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "Some fields need attention.",
                    "fields": fields,
                })),
            )
                .into_response(),

            // Generic body only; details went to the server log.
            AppError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Something went wrong. Please try again.",
                })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let response = AppError::RateLimited { retry_after: 120 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = AppError::Validation(vec![]).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = AppError::Persistence(StoreError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
