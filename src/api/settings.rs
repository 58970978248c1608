use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::db::users::User;
use crate::db::UserRepository;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    pub changed: bool,
}

async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<User>, AppError> {
    let user = UserRepository::new(&state.db).get(auth.user_id).await?;
    Ok(ApiResponse::ok("Profile fetched successfully", user))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Validated(req): Validated<UpdateProfileRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let user = UserRepository::new(&state.db)
        .update_profile(auth.user_id, req.name.as_deref(), req.phone.as_deref())
        .await?;
    Ok(ApiResponse::ok("Profile updated successfully", user))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Validated(req): Validated<ChangePasswordRequest>,
) -> Result<ApiResponse<PasswordChanged>, AppError> {
    let users = UserRepository::new(&state.db);
    let user = users.get(auth.user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }
    users.set_password_hash(user.id, &hash_password(&req.new_password)?).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok(ApiResponse::ok("Password changed successfully", PasswordChanged { changed: true }))
}
