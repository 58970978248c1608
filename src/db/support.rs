//! Support tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct SupportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn open(&self, user_id: Uuid, subject: &str, message: &str) -> Result<SupportTicket, RepositoryError> {
        let ticket = sqlx::query_as::<_, SupportTicket>("INSERT INTO support_tickets (id, user_id, subject, message) VALUES ($1, $2, $3, $4) RETURNING *")
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(subject)
            .bind(message)
            .fetch_one(self.pool)
            .await?;
        Ok(ticket)
    }

    /// Tickets of one user, or every ticket when `user_id` is `None`.
    pub async fn list(&self, user_id: Option<Uuid>) -> Result<Vec<SupportTicket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, SupportTicket>(
            "SELECT * FROM support_tickets WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tickets)
    }

    pub async fn set_status(&self, id: Uuid, status: TicketStatus) -> Result<SupportTicket, RepositoryError> {
        sqlx::query_as::<_, SupportTicket>("UPDATE support_tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Ticket"))
    }
}
