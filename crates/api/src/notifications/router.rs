//! Event-to-connection routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and pushes each
//! lifecycle event to the WebSocket connections of the users it concerns.

use std::sync::Arc;

use curbside_core::types::DbId;
use curbside_events::bus::{
    EVENT_REQUEST_ASSIGNED, EVENT_REQUEST_COMPLETED, EVENT_UPLOAD_PROGRESS,
};
use curbside_events::PlatformEvent;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ws::manager::json_frame;
use crate::ws::WsManager;

#[derive(Serialize)]
#[serde(tag = "type", rename = "notification")]
struct NotificationFrame<'a> {
    event: &'a PlatformEvent,
}

pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the routing loop until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    async fn route_event(&self, event: &PlatformEvent) {
        let targets = determine_targets(event);
        if targets.is_empty() {
            return;
        }
        let Some(frame) = json_frame(&NotificationFrame { event }) else {
            return;
        };
        for user_id in targets {
            let delivered = self.ws_manager.send_to_user(user_id, frame.clone()).await;
            tracing::trace!(user_id, delivered, event_type = %event.event_type, "Routed event");
        }
    }
}

/// Users who should hear about `event`.
///
/// - `upload.progress` goes to the uploader.
/// - `request.assigned` goes to the new assignee and the requester.
/// - `request.completed` goes to the requester.
pub fn determine_targets(event: &PlatformEvent) -> Vec<DbId> {
    match event.event_type.as_str() {
        EVENT_UPLOAD_PROGRESS => event.actor_user_id.into_iter().collect(),
        EVENT_REQUEST_ASSIGNED => {
            let mut targets: Vec<DbId> = [
                event.payload_id("assignee_id"),
                event.payload_id("requester_id"),
            ]
            .into_iter()
            .flatten()
            .collect();
            targets.dedup();
            targets
        }
        EVENT_REQUEST_COMPLETED => event.payload_id("requester_id").into_iter().collect(),
        _ => Vec::new(),
    }
}
