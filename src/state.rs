use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::events::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, events: EventPublisher) -> Self {
        Self { db, config: Arc::new(config), events }
    }
}
