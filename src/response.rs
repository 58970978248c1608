//! Success envelope: `{"message": ..., "data": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { message: message.into(), data }
    }

    /// The same envelope with `201 Created`.
    pub fn created(message: impl Into<String>, data: T) -> (StatusCode, Self) {
        (StatusCode::CREATED, Self::ok(message, data))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Limit clamped to `1..=100`, falling back to `default`.
    pub fn limit(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok("Cart fetched successfully", vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Cart fetched successfully", "data": [1, 2] }));
        let (status, _) = ApiResponse::created("Store created", ());
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination { limit: Some(500), offset: Some(-3) };
        assert_eq!(p.limit(20), 100);
        assert_eq!(p.offset(), 0);
        let p = Pagination { limit: None, offset: None };
        assert_eq!(p.limit(50), 50);
    }
}
