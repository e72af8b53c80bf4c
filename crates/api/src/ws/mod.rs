//! WebSocket live views.
//!
//! Each connection carries one live subscription for its user's role and
//! receives routed lifecycle notifications.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
