use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::db::users::{NewUser, User};
use crate::db::UserRepository;
use crate::domain::value_objects::Role;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: Option<Role>,
    /// Creates the seller profile straight away when signing up as a seller.
    #[validate(length(min = 1, max = 200))]
    pub business_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

async fn signup(
    State(state): State<AppState>,
    Validated(req): Validated<SignupRequest>,
) -> Result<(StatusCode, ApiResponse<AuthResponse>), AppError> {
    let role = req.role.unwrap_or(Role::User);
    if role == Role::Admin {
        return Err(AppError::BadRequest("Cannot sign up as admin".to_string()));
    }

    // Sellers fall back to their own name for the business.
    let business_name = (role == Role::Seller).then(|| req.business_name.as_deref().unwrap_or(&req.name));
    let (user, _) = UserRepository::new(&state.db)
        .register(
            NewUser {
                email: &req.email,
                name: &req.name,
                phone: req.phone.as_deref(),
                password_hash: hash_password(&req.password)?,
                role,
            },
            business_name,
        )
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "account created");
    let token = issue_token(user.id, user.role, state.config.jwt_secret_bytes(), state.config.token_ttl_hours)?;
    Ok(ApiResponse::created("User created successfully", AuthResponse { token, user }))
}

async fn login(State(state): State<AppState>, Validated(req): Validated<LoginRequest>) -> Result<ApiResponse<AuthResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let user = UserRepository::new(&state.db).find_by_email(&req.email).await?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "password mismatch");
        return Err(invalid());
    }
    let token = issue_token(user.id, user.role, state.config.jwt_secret_bytes(), state.config.token_ttl_hours)?;
    Ok(ApiResponse::ok("Login successful", AuthResponse { token, user }))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<User>, AppError> {
    let user = UserRepository::new(&state.db).get(auth.user_id).await?;
    Ok(ApiResponse::ok("User fetched successfully", user))
}
