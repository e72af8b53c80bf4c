//! End-to-end tests for live views: a real listener, real WebSocket clients.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use common::{
    body_json, get_auth, png_bytes, post_json_auth, post_multipart_auth, register, submission,
    submit_request, Account, TestApp,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(t: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = t.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, account: &Account) -> Client {
    let url = format!("ws://{addr}/api/v1/ws?token={}", account.token);
    let (client, _) = connect_async(url).await.expect("WebSocket handshake");
    client
}

/// Read JSON frames until one satisfies `accept`.
async fn next_matching(client: &mut Client, accept: impl Fn(&Value) -> bool) -> Value {
    tokio::time::timeout(FRAME_TIMEOUT, async {
        loop {
            let message = client
                .next()
                .await
                .expect("socket closed early")
                .expect("socket error");
            let Message::Text(text) = message else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).unwrap();
            if accept(&frame) {
                return frame;
            }
        }
    })
    .await
    .expect("timed out waiting for frame")
}

fn snapshot_with(count: usize) -> impl Fn(&Value) -> bool {
    move |frame: &Value| {
        frame["type"] == "snapshot" && frame["data"]["requests"].as_array().map(Vec::len) == Some(count)
    }
}

fn notification(event_type: &'static str) -> impl Fn(&Value) -> bool {
    move |frame: &Value| frame["type"] == "notification" && frame["event"]["event_type"] == event_type
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requester_view_updates_after_each_write() {
    let t = common::build_test_app();
    let addr = serve(&t).await;
    let ravi = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;

    let mut client = connect(addr, &ravi).await;
    let initial = next_matching(&mut client, snapshot_with(0)).await;
    assert_eq!(initial["data"]["view"], "requester");

    let id = submit_request(t.router(), &ravi, "broken chair").await;
    let after_submit = next_matching(&mut client, snapshot_with(1)).await;
    assert_eq!(after_submit["data"]["requests"][0]["id"], id);
    assert_eq!(after_submit["data"]["requests"][0]["status"], "pending");

    post_json_auth(
        t.router(),
        &format!("/api/v1/requests/{id}/assign"),
        json!({ "worker_id": asha.id }),
        &admin.token,
    )
    .await;

    // The snapshot and the routed notification travel independently.
    let is_assigned_snapshot =
        |frame: &Value| frame["type"] == "snapshot" && frame["data"]["requests"][0]["status"] == "assigned";
    let is_assigned_note = notification("request.assigned");
    let (mut snapshot, mut note) = (None, None);
    while snapshot.is_none() || note.is_none() {
        let frame =
            next_matching(&mut client, |f| is_assigned_snapshot(f) || is_assigned_note(f)).await;
        if frame["type"] == "snapshot" {
            snapshot = Some(frame);
        } else {
            note = Some(frame);
        }
    }
    let (snapshot, note) = (snapshot.unwrap(), note.unwrap());
    assert_eq!(snapshot["data"]["requests"][0]["assignee_name"], "Asha");
    assert_eq!(note["event"]["payload"]["assignee_name"], "Asha");
}

#[tokio::test]
async fn worker_view_holds_only_open_assignments() {
    let t = common::build_test_app();
    let addr = serve(&t).await;
    let ravi = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let bilal = register(t.router(), "Bilal", "worker").await;

    let mut client = connect(addr, &asha).await;
    let initial = next_matching(&mut client, snapshot_with(0)).await;
    assert_eq!(initial["data"]["view"], "worker");

    let mine = submit_request(t.router(), &ravi, "for asha").await;
    let theirs = submit_request(t.router(), &ravi, "for bilal").await;
    for (id, worker) in [(mine, &asha), (theirs, &bilal)] {
        post_json_auth(
            t.router(),
            &format!("/api/v1/requests/{id}/assign"),
            json!({ "worker_id": worker.id }),
            &admin.token,
        )
        .await;
    }

    let assigned = next_matching(&mut client, snapshot_with(1)).await;
    assert_eq!(assigned["data"]["requests"][0]["id"], mine);
    assert!(assigned["data"]["requests"][0]["directions_url"].is_string());

    // Completing drops it from the worker's open list.
    common::post_auth(
        t.router(),
        &format!("/api/v1/requests/{mine}/complete"),
        &asha.token,
    )
    .await;
    next_matching(&mut client, snapshot_with(0)).await;
}

#[tokio::test]
async fn admin_view_includes_workers_and_counts() {
    let t = common::build_test_app();
    let addr = serve(&t).await;
    let ravi = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    register(t.router(), "Asha", "worker").await;

    let mut client = connect(addr, &admin).await;
    submit_request(t.router(), &ravi, "one").await;
    submit_request(t.router(), &ravi, "two").await;

    let frame = next_matching(&mut client, snapshot_with(2)).await;
    assert_eq!(frame["data"]["view"], "admin");
    assert_eq!(frame["data"]["workers"][0]["name"], "Asha");
    assert_eq!(frame["data"]["stats"]["total"], 2);
    assert_eq!(frame["data"]["stats"]["pending"], 2);
}

#[tokio::test]
async fn closing_the_socket_releases_its_live_query() {
    let t = common::build_test_app();
    let addr = serve(&t).await;
    let ravi = register(t.router(), "Ravi", "requester").await;

    let mut client = connect(addr, &ravi).await;
    next_matching(&mut client, snapshot_with(0)).await;
    assert_eq!(t.state.live.active(), 1);

    let _ = client.close(None).await;
    drop(client);

    tokio::time::timeout(FRAME_TIMEOUT, async {
        while t.state.live.active() > 0 || t.state.ws_manager.connection_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("live query should be released after disconnect");
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let t = common::build_test_app();
    let addr = serve(&t).await;

    let result = connect_async(format!("ws://{addr}/api/v1/ws")).await;
    assert!(result.is_err());
    assert_eq!(t.state.ws_manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Upload progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_progress_reaches_the_requester_in_order() {
    let t = common::build_test_app();
    let addr = serve(&t).await;
    let ravi = register(t.router(), "Ravi", "requester").await;

    let mut client = connect(addr, &ravi).await;
    next_matching(&mut client, snapshot_with(0)).await;

    let form = submission("old fridge").file("photo", "fridge.png", "image/png", &png_bytes(1200, 900));
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &ravi.token).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut seen = Vec::new();
    loop {
        let frame = next_matching(&mut client, notification("upload.progress")).await;
        let percent = frame["event"]["payload"]["percent"].as_f64().unwrap();
        seen.push(percent);
        if percent >= 100.0 {
            break;
        }
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
    assert_eq!(seen.last(), Some(&100.0));
}

// ---------------------------------------------------------------------------
// One-shot dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_endpoint_matches_role() {
    let t = common::build_test_app();
    let ravi = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    submit_request(t.router(), &ravi, "one").await;

    let mine = body_json(get_auth(t.router(), "/api/v1/dashboard", &ravi.token).await).await;
    assert_eq!(mine["data"]["view"], "requester");
    assert_eq!(mine["data"]["requests"].as_array().unwrap().len(), 1);

    let all = body_json(get_auth(t.router(), "/api/v1/dashboard", &admin.token).await).await;
    assert_eq!(all["data"]["view"], "admin");
    assert_eq!(all["data"]["stats"]["total"], 1);
}
