//! HTTP surface checks that resolve before any query reaches the database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use marketplace_commerce::auth::issue_token;
use marketplace_commerce::domain::value_objects::Role;
use marketplace_commerce::events::EventPublisher;
use marketplace_commerce::{build_router, AppState, Config};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "router-test-secret-that-is-long-enough-0123";

fn config(prefix: &str) -> Config {
    let prefix = prefix.to_string();
    Config::from_lookup(move |key: &str| match key {
        "DATABASE_URL" => Some("postgres://localhost:1/unused".to_string()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        "API_PREFIX" => Some(prefix.clone()),
        _ => None,
    })
    .unwrap()
}

fn app_with_prefix(prefix: &str) -> Router {
    let config = config(prefix);
    let pool = PgPoolOptions::new().connect_lazy("postgres://localhost:1/unused").unwrap();
    build_router(AppState::new(pool, config, EventPublisher::default()))
}

fn app() -> Router {
    app_with_prefix("/api/v1")
}

fn token(role: Role) -> String {
    issue_token(Uuid::now_v7(), role, SECRET.as_bytes(), 1).unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match body {
        Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_service() {
    let (status, body) = send(app(), request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "service": "marketplace-commerce" }));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (status, body) = send(app(), request(Method::GET, "/api/v1/cart", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Missing Authorization header" }));
}

#[tokio::test]
async fn malformed_authorization_header_is_unauthorized() {
    let req = Request::builder()
        .uri("/api/v1/user/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Authorization format");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let forged = issue_token(Uuid::now_v7(), Role::Admin, b"some-other-secret-also-long-enough-000", 1).unwrap();
    let (status, body) = send(app(), request(Method::GET, "/api/v1/admin/users", Some(&forged), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn user_token_cannot_reach_seller_routes() {
    let body = r#"{"name":"Corner Shop"}"#;
    let (status, body) = send(app(), request(Method::POST, "/api/v1/store", Some(&token(Role::User)), Some(body))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Access denied: seller role required" }));
}

#[tokio::test]
async fn seller_token_cannot_reach_admin_routes() {
    let (status, body) = send(app(), request(Method::GET, "/api/v1/admin/users", Some(&token(Role::Seller)), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied: admin role required");
}

#[tokio::test]
async fn seller_token_cannot_use_cart() {
    let (status, _) = send(app(), request(Method::GET, "/api/v1/cart", Some(&token(Role::Seller)), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_body_lists_field_errors() {
    let body = r#"{"name":""}"#;
    let (status, body) = send(app(), request(Method::POST, "/api/v1/store", Some(&token(Role::Seller)), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "name");
    assert_eq!(body["details"][0]["message"], "Store name is required");
    assert_eq!(body["details"][0]["code"], "length");
}

#[tokio::test]
async fn malformed_json_is_bad_request_without_details() {
    let (status, body) = send(app(), request(Method::POST, "/api/v1/user/login", None, Some("{not json"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn signup_rejects_short_password_and_bad_email() {
    let body = r#"{"email":"not-an-email","password":"short","name":"Ada"}"#;
    let (status, body) = send(app(), request(Method::POST, "/api/v1/user/signup", None, Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["details"].as_array().unwrap().iter().map(|d| d["field"].as_str().unwrap()).collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn signup_as_admin_is_refused() {
    let body = r#"{"email":"root@example.com","password":"long-enough-pw","name":"Root","role":"admin"}"#;
    let (status, body) = send(app(), request(Method::POST, "/api/v1/user/signup", None, Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot sign up as admin");
}

#[tokio::test]
async fn add_to_cart_requires_positive_quantity() {
    let body = json!({ "store_id": Uuid::now_v7(), "product_id": Uuid::now_v7(), "quantity": 0 }).to_string();
    let (status, body) = send(app(), request(Method::POST, "/api/v1/cart/add", Some(&token(Role::User)), Some(&body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "quantity");
}

#[tokio::test]
async fn review_rating_must_be_between_one_and_five() {
    let uri = format!("/api/v1/order/{}/review", Uuid::now_v7());
    let (status, body) = send(app(), request(Method::POST, &uri, Some(&token(Role::User)), Some(r#"{"rating":6}"#))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "rating");
}

#[tokio::test]
async fn store_hours_validate_each_day() {
    let uri = format!("/api/v1/dashboard/store-hours/{}", Uuid::now_v7());
    let body = r#"{"hours":[{"day_of_week":9,"is_closed":true}]}"#;
    let (status, body) = send(app(), request(Method::PUT, &uri, Some(&token(Role::Seller)), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "hours[0].day_of_week");
}

#[tokio::test]
async fn store_hours_reject_inverted_window() {
    let uri = format!("/api/v1/dashboard/store-hours/{}", Uuid::now_v7());
    let body = r#"{"hours":[{"day_of_week":1,"open_time":"18:00:00","close_time":"09:00:00"}]}"#;
    let (status, body) = send(app(), request(Method::PUT, &uri, Some(&token(Role::Seller)), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "hours[0]");
    assert_eq!(body["details"][0]["code"], "invalid_hours");
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() {
    let (status, body) = send(app(), request(Method::GET, "/api/v1/nowhere", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Route not found" }));
}

#[tokio::test]
async fn empty_prefix_mounts_at_root() {
    let (status, _) = send(app_with_prefix(""), request(Method::GET, "/cart", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(app_with_prefix(""), request(Method::GET, "/api/v1/cart", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
