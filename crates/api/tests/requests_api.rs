//! HTTP-level integration tests for the request lifecycle:
//! submission, assignment, completion and per-role visibility.

mod common;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use common::{
    body_json, get_auth, png_bytes, post_auth, post_json_auth, post_multipart_auth, register,
    submission, submit_request, MultipartForm,
};
use curbside_db::models::request::RequestFilter;
use curbside_db::models::user::CreateUser;
use curbside_db::{RequestStore, UserDirectory};
use serde_json::json;

fn timestamp(value: &serde_json::Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

async fn assign(app: Router, id: i64, worker_id: i64, token: &str) -> Response<Body> {
    post_json_auth(
        app,
        &format!("/api/v1/requests/{id}/assign"),
        json!({ "worker_id": worker_id }),
        token,
    )
    .await
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submission_without_photo_is_pending_with_synthesized_label() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = MultipartForm::new()
        .text("description", "broken chair")
        .text("latitude", "12.9")
        .text("longitude", "77.6");
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "pending");
    assert!(data["photo_url"].is_null());
    assert!(data["assignee_name"].is_null());
    assert_eq!(data["requester_name"], "Ravi");
    let location = data["location"].as_str().unwrap();
    assert!(location.contains("12.9"), "label was {location}");
    assert!(location.contains("77.6"), "label was {location}");
    assert_eq!(data["coordinates"]["latitude"], 12.9);
    assert_eq!(data["coordinates"]["longitude"], 77.6);
}

#[tokio::test]
async fn supplied_location_label_is_kept() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = submission("mattress").text("location", "Gate 3, MG Road");
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["location"], "Gate 3, MG Road");
}

#[tokio::test]
async fn empty_description_creates_nothing() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let response = post_multipart_auth(
        t.router(),
        "/api/v1/requests",
        submission("   "),
        &resident.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Please enter a description.");

    let all = t.store.query_requests(&RequestFilter::default()).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn missing_location_is_reported_first() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = MultipartForm::new()
        .text("description", "")
        .text("latitude", "")
        .text("longitude", "");
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Please select a location on the map."
    );
}

#[tokio::test]
async fn non_numeric_coordinate_is_bad_request() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = MultipartForm::new()
        .text("description", "sofa")
        .text("latitude", "north")
        .text("longitude", "77.6");
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn photo_is_compressed_and_stored_under_media_root() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = submission("old fridge").file("photo", "fridge.png", "image/png", &png_bytes(2000, 1000));
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let data = body_json(response).await["data"].clone();
    let url = data["photo_url"].as_str().unwrap();
    let prefix = format!("http://localhost:3000/media/requests/{}-", resident.id);
    assert!(url.starts_with(&prefix), "unexpected url {url}");
    assert!(url.ends_with(".jpg"));

    let object = url.trim_start_matches("http://localhost:3000/media/");
    let stored = std::fs::read(t.media_root().join(object)).unwrap();
    let decoded = image::load_from_memory(&stored).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1920, 960));

    // And it is served back.
    let served = common::get(t.router(), &format!("/media/{object}")).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[tokio::test]
async fn undecodable_photo_aborts_submission() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;

    let form = submission("tv").file("photo", "tv.png", "image/png", b"definitely not an image");
    let response = post_multipart_auth(t.router(), "/api/v1/requests", form, &resident.token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let all = t.store.query_requests(&RequestFilter::default()).await.unwrap();
    assert!(all.is_empty());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn assign_then_complete_moves_forward_and_keeps_assignee() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let id = submit_request(t.router(), &resident, "broken chair").await;

    let response = assign(t.router(), id, asha.id, &admin.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let assigned = body_json(response).await["data"].clone();
    assert_eq!(assigned["status"], "assigned");
    assert_eq!(assigned["assignee_name"], "Asha");
    assert!(timestamp(&assigned["updated_at"]) >= timestamp(&assigned["created_at"]));

    let response = post_auth(
        t.router(),
        &format!("/api/v1/requests/{id}/complete"),
        &asha.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let completed = body_json(response).await["data"].clone();
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["assignee_name"], "Asha");
    assert_eq!(completed["coordinates"], assigned["coordinates"]);
}

#[tokio::test]
async fn transitions_never_move_backwards() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let id = submit_request(t.router(), &resident, "sofa").await;

    // Completing a pending request is a conflict.
    let response = post_auth(
        t.router(),
        &format!("/api/v1/requests/{id}/complete"),
        &asha.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(
        assign(t.router(), id, asha.id, &admin.token).await.status(),
        StatusCode::OK
    );
    // Already assigned.
    assert_eq!(
        assign(t.router(), id, asha.id, &admin.token).await.status(),
        StatusCode::CONFLICT
    );

    post_auth(t.router(), &format!("/api/v1/requests/{id}/complete"), &asha.token).await;
    // Completed is terminal.
    assert_eq!(
        assign(t.router(), id, asha.id, &admin.token).await.status(),
        StatusCode::CONFLICT
    );
    let again = post_auth(t.router(), &format!("/api/v1/requests/{id}/complete"), &asha.token).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

// Interleavings where both calls read `pending` before either writes are
// driven deterministically in the lifecycle service tests.
#[tokio::test]
async fn concurrent_assignments_leave_one_consistent_assignee() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let bilal = register(t.router(), "Bilal", "worker").await;
    let id = submit_request(t.router(), &resident, "wardrobe").await;

    let uri = format!("/api/v1/requests/{id}/assign");
    let (first, second) = tokio::join!(
        post_json_auth(t.router(), &uri, json!({ "worker_id": asha.id }), &admin.token),
        post_json_auth(t.router(), &uri, json!({ "worker_id": bilal.id }), &admin.token),
    );
    let statuses = [first.status(), second.status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::OK || *s == StatusCode::CONFLICT));

    let all = t.store.query_requests(&RequestFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
    let record = &all[0];
    let name = record.assignee_name.as_deref().unwrap();
    assert!(name == "Asha" || name == "Bilal");
    let expected_id = if name == "Asha" { asha.id } else { bilal.id };
    assert_eq!(record.assignee_id, Some(expected_id));
}

#[tokio::test]
async fn assigning_to_a_non_worker_is_not_found() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let id = submit_request(t.router(), &resident, "boxes").await;

    let response = assign(t.router(), id, resident.id, &admin.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let record = t.store.find_request(id).await.unwrap().unwrap();
    assert!(record.assignee_name.is_none());
}

#[tokio::test]
async fn only_the_assignee_can_complete() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let bilal = register(t.router(), "Bilal", "worker").await;
    let id = submit_request(t.router(), &resident, "bicycle").await;

    assign(t.router(), id, asha.id, &admin.token).await;

    let response = post_auth(
        t.router(),
        &format!("/api/v1/requests/{id}/complete"),
        &bilal.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let t = common::build_test_app();
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;

    let response = post_json_auth(
        t.router(),
        "/api/v1/requests/9999/assign",
        json!({ "worker_id": asha.id }),
        &admin.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listings_are_scoped_by_role() {
    let t = common::build_test_app();
    let ravi = register(t.router(), "Ravi", "requester").await;
    let meena = register(t.router(), "Meena", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;

    let first = submit_request(t.router(), &ravi, "first").await;
    let second = submit_request(t.router(), &ravi, "second").await;
    submit_request(t.router(), &meena, "other").await;

    assign(t.router(), first, asha.id, &admin.token).await;

    let mine = body_json(get_auth(t.router(), "/api/v1/requests/mine", &ravi.token).await).await;
    let ids: Vec<i64> = mine["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let assigned =
        body_json(get_auth(t.router(), "/api/v1/requests/assigned", &asha.token).await).await;
    let assigned = assigned["data"].as_array().unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0]["id"], first);
    assert_eq!(
        assigned[0]["directions_url"],
        "https://www.google.com/maps/dir/?api=1&destination=12.9716,77.5946"
    );

    let all = body_json(get_auth(t.router(), "/api/v1/requests", &admin.token).await).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn single_request_is_visible_to_owner_assignee_and_admin_only() {
    let t = common::build_test_app();
    let ravi = register(t.router(), "Ravi", "requester").await;
    let meena = register(t.router(), "Meena", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let asha = register(t.router(), "Asha", "worker").await;
    let bilal = register(t.router(), "Bilal", "worker").await;
    let id = submit_request(t.router(), &ravi, "lamp").await;
    assign(t.router(), id, asha.id, &admin.token).await;

    let uri = format!("/api/v1/requests/{id}");
    for (token, expected) in [
        (&ravi.token, StatusCode::OK),
        (&asha.token, StatusCode::OK),
        (&admin.token, StatusCode::OK),
        (&meena.token, StatusCode::FORBIDDEN),
        (&bilal.token, StatusCode::FORBIDDEN),
    ] {
        assert_eq!(get_auth(t.router(), &uri, token).await.status(), expected);
    }
}

#[tokio::test]
async fn workers_roster_is_admin_only() {
    let t = common::build_test_app();
    let admin = register(t.router(), "Admin", "admin").await;
    register(t.router(), "Bilal", "worker").await;
    let asha = register(t.router(), "Asha", "worker").await;

    let roster = body_json(get_auth(t.router(), "/api/v1/workers", &admin.token).await).await;
    let names: Vec<&str> = roster["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Asha", "Bilal"]);

    let response = get_auth(t.router(), "/api/v1/workers", &asha.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn legacy_worker_accounts_appear_in_roster_and_take_work() {
    let t = common::build_test_app();
    let resident = register(t.router(), "Ravi", "requester").await;
    let admin = register(t.router(), "Admin", "admin").await;
    let zoya = register(t.router(), "Zoya", "worker").await;
    let bala = t
        .store
        .create_user(&CreateUser {
            name: "Bala".into(),
            email: "bala@test.com".into(),
            password_hash: "unused".into(),
            role: "cleaner".into(),
        })
        .await
        .unwrap();

    let roster = body_json(get_auth(t.router(), "/api/v1/workers", &admin.token).await).await;
    let ids: Vec<i64> = roster["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![bala.id, zoya.id]);

    let id = submit_request(t.router(), &resident, "mattress").await;
    let response = assign(t.router(), id, bala.id, &admin.token).await;
    assert_eq!(response.status(), StatusCode::OK);
}
