use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use curbside_events::{Snapshot, ViewScope};
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::{AuthUser, WsAuthUser};
use crate::state::AppState;
use crate::ws::manager::json_frame;

/// Outbound frame carrying a full view snapshot.
#[derive(Serialize)]
#[serde(tag = "type", rename = "snapshot")]
struct SnapshotFrame<'a> {
    data: &'a Snapshot,
}

/// GET /api/v1/ws?token=...
///
/// Authenticates before upgrading; the role decides which live view the
/// connection receives.
pub async fn ws_handler(
    WsAuthUser(user): WsAuthUser,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let scope = ViewScope::for_role(user.role()?, user.user_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, scope)))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards the manager channel to the sink.
///   3. Opens a live subscription and forwards each snapshot.
///   4. Drains inbound frames until the client goes away, then releases
///      the subscription and unregisters.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthUser, scope: ViewScope) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, ?scope, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user.user_id).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let mut subscription = state.live.subscribe(scope);
    let manager = state.ws_manager.clone();
    let snapshot_conn_id = conn_id.clone();
    let snapshot_task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            let Some(frame) = json_frame(&SnapshotFrame { data: &snapshot }) else {
                continue;
            };
            if !manager.send_to(&snapshot_conn_id, frame).await {
                break;
            }
        }
        // Dropping `subscription` here releases the live query.
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    snapshot_task.abort();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = user.user_id, "WebSocket disconnected");
}
