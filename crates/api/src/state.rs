use std::sync::Arc;

use curbside_db::media::MediaStore;
use curbside_db::SharedStore;
use curbside_events::{EventBus, LiveQueries};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Users and pickup requests.
    pub store: SharedStore,
    /// Photo storage.
    pub media: Arc<dyn MediaStore>,
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Lifecycle event bus.
    pub event_bus: Arc<EventBus>,
    /// Standing per-view queries backing the live dashboards.
    pub live: Arc<LiveQueries>,
}
