//! Publishes domain events to NATS when a server is configured.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    /// Connects to `url`, falling back to log-only publishing if the server is unreachable.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::default() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will only be logged");
                Self::default()
            }
        }
    }

    /// Best effort: a failed publish is logged and never fails the request.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(subject, error = %e, "failed to serialize event");
                    continue;
                }
            };
            match &self.nats {
                Some(client) => {
                    if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                        tracing::warn!(subject, error = %e, "failed to publish event");
                    }
                }
                None => tracing::debug!(subject, "event (no broker configured)"),
            }
        }
    }
}
