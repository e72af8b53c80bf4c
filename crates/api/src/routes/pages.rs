//! Browser-facing pages: the landing page, the role-gated dashboard shell,
//! and the catch-all not-found response.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppError;
use crate::middleware::auth::WsAuthUser;
use crate::state::AppState;

const LANDING_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Curbside</title></head>
<body>
  <h1>Curbside</h1>
  <p>Pickup requests for residents, field workers and administrators.</p>
  <ul>
    <li>Residents submit a pickup with a map location and an optional photo.</li>
    <li>Workers see the jobs assigned to them and mark them done.</li>
    <li>Administrators see everything and assign pending work.</li>
  </ul>
  <p>Sign in through <code>POST /api/v1/auth/login</code>, then open
     <code>/dashboard?token=&lt;access token&gt;</code>.</p>
</body>
</html>
"#;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Curbside dashboard</title></head>
<body>
  <h1>Dashboard</h1>
  <p id="status">Connecting...</p>
  <pre id="view"></pre>
  <ul id="events"></ul>
  <script>
    const token = new URLSearchParams(location.search).get("token") || "";
    const scheme = location.protocol === "https:" ? "wss" : "ws";
    const socket = new WebSocket(`${scheme}://${location.host}/api/v1/ws?token=${encodeURIComponent(token)}`);
    socket.onopen = () => { document.getElementById("status").textContent = "Live"; };
    socket.onclose = () => { document.getElementById("status").textContent = "Disconnected"; };
    socket.onmessage = (msg) => {
      const frame = JSON.parse(msg.data);
      if (frame.type === "snapshot") {
        document.getElementById("view").textContent = JSON.stringify(frame.data, null, 2);
      } else if (frame.type === "notification") {
        const item = document.createElement("li");
        item.textContent = frame.event.event_type;
        document.getElementById("events").prepend(item);
      }
    };
  </script>
</body>
</html>
"#;

/// GET /
async fn landing() -> Html<&'static str> {
    Html(LANDING_HTML)
}

/// GET /dashboard
///
/// Serves the dashboard shell to any signed-in user with a known role.
/// Everyone else is sent back to `/`.
async fn dashboard(auth: Result<WsAuthUser, AppError>) -> Response {
    match auth {
        Ok(WsAuthUser(user)) if user.role().is_ok() => Html(DASHBOARD_HTML).into_response(),
        Ok(WsAuthUser(user)) => {
            tracing::debug!(user_id = user.user_id, role = %user.role, "Unknown role, redirecting");
            Redirect::to("/").into_response()
        }
        Err(_) => Redirect::to("/").into_response(),
    }
}

/// Catch-all for unmatched paths.
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "The requested resource does not exist",
            "code": "NOT_FOUND",
        })),
    )
}

/// Mount page routes at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/dashboard", get(dashboard))
}
