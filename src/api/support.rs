use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminRole, AuthUser, Authorized};
use crate::db::support::{SupportTicket, TicketStatus};
use crate::db::SupportRepository;
use crate::domain::value_objects::Role;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickets).post(open_ticket))
        .route("/:id/status", put(set_status))
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenTicketRequest {
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000, message = "Message is required"))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}

async fn open_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Validated(req): Validated<OpenTicketRequest>,
) -> Result<(StatusCode, ApiResponse<SupportTicket>), AppError> {
    let ticket = SupportRepository::new(&state.db).open(auth.user_id, &req.subject, &req.message).await?;
    tracing::info!(ticket_id = %ticket.id, user_id = %auth.user_id, "support ticket opened");
    Ok(ApiResponse::created("Support ticket created successfully", ticket))
}

/// Admins see every ticket.
async fn list_tickets(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<Vec<SupportTicket>>, AppError> {
    let owner = (auth.role != Role::Admin).then_some(auth.user_id);
    let tickets = SupportRepository::new(&state.db).list(owner).await?;
    Ok(ApiResponse::ok("Support tickets fetched successfully", tickets))
}

async fn set_status(
    State(state): State<AppState>,
    _admin: Authorized<AdminRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<TicketStatusRequest>,
) -> Result<ApiResponse<SupportTicket>, AppError> {
    let ticket = SupportRepository::new(&state.db).set_status(id, req.status).await?;
    Ok(ApiResponse::ok("Ticket status updated successfully", ticket))
}
