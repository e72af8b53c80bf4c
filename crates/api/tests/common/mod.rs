#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use tower::ServiceExt;

use curbside_api::auth::jwt::JwtConfig;
use curbside_api::config::{LogFormat, ServerConfig};
use curbside_api::notifications::NotificationRouter;
use curbside_api::router::build_app_router;
use curbside_api::state::AppState;
use curbside_api::ws::WsManager;
use curbside_db::media::LocalMediaStore;
use curbside_db::MemoryStore;
use curbside_events::{EventBus, LiveQueries};

pub const TEST_PASSWORD: &str = "test_password_123!";
pub const MULTIPART_BOUNDARY: &str = "curbside-test-boundary";

/// A fully wired application over the in-memory store.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    /// Keeps the media root alive for the lifetime of the test.
    pub media_dir: tempfile::TempDir,
}

impl TestApp {
    /// A fresh handle to the router for one `oneshot` call.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn media_root(&self) -> PathBuf {
        self.media_dir.path().to_path_buf()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(media_root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        media_root,
        public_base_url: "http://localhost:3000".to_string(),
        max_upload_bytes: 20 * 1024 * 1024,
        log_format: LogFormat::Pretty,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as `main.rs`, so integration tests
/// exercise the production middleware stack. The notification router runs
/// so WebSocket tests observe routed events.
pub fn build_test_app() -> TestApp {
    let media_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(media_dir.path().to_path_buf());

    let store = Arc::new(MemoryStore::new());
    let media = Arc::new(LocalMediaStore::new(
        media_dir.path(),
        config.public_base_url.clone(),
    ));
    let ws_manager = Arc::new(WsManager::new());
    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(NotificationRouter::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()));

    let state = AppState {
        store: store.clone(),
        media,
        config: Arc::new(config),
        ws_manager,
        event_bus,
        live: Arc::new(LiveQueries::new(store.clone())),
    };
    let app = build_app_router(state.clone()).expect("router builds");

    TestApp {
        app,
        state,
        store,
        media_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should not fail")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::post(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// Minimal `multipart/form-data` body builder.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    form: MultipartForm,
    token: &str,
) -> Response<Body> {
    let request = Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(form.finish()))
        .unwrap();
    send(app, request).await
}

/// A valid submission form at a fixed position.
pub fn submission(description: &str) -> MultipartForm {
    MultipartForm::new()
        .text("description", description)
        .text("latitude", "12.97160")
        .text("longitude", "77.59460")
}

/// An encoded PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A registered account and its access token.
pub struct Account {
    pub id: i64,
    pub name: String,
    pub token: String,
}

/// Register through the API and return the account.
pub async fn register(app: Router, name: &str, role: &str) -> Account {
    let email = format!("{}@test.com", name.to_lowercase().replace(' ', "."));
    let body = serde_json::json!({
        "name": name,
        "email": email,
        "password": TEST_PASSWORD,
        "role": role,
    });
    let response = post_json(app, "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED, "registration of {name} should succeed");
    let json = body_json(response).await;
    Account {
        id: json["user"]["id"].as_i64().unwrap(),
        name: name.to_string(),
        token: json["access_token"].as_str().unwrap().to_string(),
    }
}

/// Submit a valid request as `account` and return its id.
pub async fn submit_request(app: Router, account: &Account, description: &str) -> i64 {
    let response = post_multipart_auth(
        app,
        "/api/v1/requests",
        submission(description),
        &account.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
