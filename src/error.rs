//! Unified error handling for the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::domain::aggregates::{CartError, OrderError, ProductError, SettlementError};

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

/// Application-level error type returned by every handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[source] RepositoryError),

    /// Request body failed schema validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [FieldError]>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, source = ?std::error::Error::source(&self), "request failed");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let details = match &self {
            Self::Validation(fields) => Some(fields.as_slice()),
            _ => None,
        };

        (status, Json(ErrorBody { error: &message, details })).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(what) => AppError::not_found(what),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Forbidden(msg) => AppError::Forbidden(msg),
            RepositoryError::Cart(e) => e.into(),
            RepositoryError::Order(e) => e.into(),
            RepositoryError::Product(e) => e.into(),
            RepositoryError::Settlement(e) => e.into(),
            other @ (RepositoryError::Database(_) | RepositoryError::DataCorruption(_)) => AppError::Database(other),
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Forbidden => AppError::Forbidden("Unauthorized".to_string()),
            CartError::LineNotFound => AppError::NotFound(e.to_string()),
            CartError::ProductNotInStore | CartError::NotActive | CartError::Empty
            | CartError::InvalidQuantity(_) | CartError::InsufficientStock { .. } => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotPermitted { .. } => AppError::Forbidden(e.to_string()),
            OrderError::EmptyCart | OrderError::CartNotActive | OrderError::InvalidTransition { .. }
            | OrderError::NotReviewable => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self { AppError::BadRequest(e.to_string()) }
}

impl From<SettlementError> for AppError {
    fn from(e: SettlementError) -> Self { AppError::BadRequest(e.to_string()) }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self { AppError::Database(RepositoryError::Database(e)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::not_found("Product").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_domain_error_mapping() {
        assert_eq!(AppError::from(CartError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from(CartError::LineNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(CartError::InsufficientStock { available: 1, requested: 2 }).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::from(RepositoryError::NotFound("Cart item")).to_string(), "Cart item not found");
        assert_eq!(AppError::from(RepositoryError::Cart(CartError::Forbidden)).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from(SettlementError::NoOrders).status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = body_json(AppError::from(RepositoryError::DataCorruption("bad row".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let field = FieldError { field: "quantity".into(), message: "must be at least 1".into(), code: "range".into() };
        let (status, body) = body_json(AppError::Validation(vec![field])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0]["field"], "quantity");
    }
}
