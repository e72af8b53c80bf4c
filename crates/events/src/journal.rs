//! Structured lifecycle journal.
//!
//! [`EventJournal`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every [`PlatformEvent`] to the log. It runs as a long-lived
//! background task and stops when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::{PlatformEvent, EVENT_UPLOAD_PROGRESS};

pub struct EventJournal;

impl EventJournal {
    /// Run the journal loop until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::record(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event journal lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, journal shutting down");
                    break;
                }
            }
        }
    }

    fn record(event: &PlatformEvent) {
        // Progress ticks are noisy; keep them out of the default filter.
        if event.event_type == EVENT_UPLOAD_PROGRESS {
            tracing::trace!(
                actor_user_id = ?event.actor_user_id,
                payload = %event.payload,
                "upload progress"
            );
            return;
        }
        tracing::info!(
            event_type = %event.event_type,
            source_entity_type = ?event.source_entity_type,
            source_entity_id = ?event.source_entity_id,
            actor_user_id = ?event.actor_user_id,
            payload = %event.payload,
            at = %event.timestamp,
            "Lifecycle event"
        );
    }
}
