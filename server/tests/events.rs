mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{event_body, TestApp};

#[tokio::test]
async fn test_create_event_submits_by_default() {
    let app = TestApp::new();
    app.department("PGSO", &["Chairs"]).await;
    let (owner_id, owner) = app.user(None);

    let event = app.event(&owner, &["pgso"], false).await;
    assert_eq!(event["status"], "submitted");
    assert_eq!(event["ownerId"], owner_id.to_string());
    assert_eq!(event["taggedDepartments"], json!(["PGSO"]));
    assert!(!event["submittedAt"].is_null());
}

#[tokio::test]
async fn test_create_event_rejects_unknown_department() {
    let app = TestApp::new();
    let (_, owner) = app.user(None);

    let (status, body) = app.post("/api/events", &owner, event_body(&["PHO"], false)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Department not found: PHO");
}

#[tokio::test]
async fn test_create_event_validates_schedule_and_contact() {
    let app = TestApp::new();
    let (_, owner) = app.user(None);

    let mut body = event_body(&[], false);
    body["endTime"] = json!("07:00:00");
    let (status, _) = app.post("/api/events", &owner, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = event_body(&[], false);
    body["contactNumber"] = json!("12345");
    let (status, body) = app.post("/api/events", &owner, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Contact number must be 11 digits");
}

#[tokio::test]
async fn test_status_workflow() {
    let app = TestApp::new();
    let (_, owner) = app.user(None);
    let (_, admin) = app.admin();
    let event = app.event(&owner, &[], true).await;
    assert_eq!(event["status"], "draft");

    let uri = format!("/api/events/{}/status", event["id"].as_str().unwrap());
    let (status, _) = set_status(&app, &uri, &owner, "approved").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = set_status(&app, &uri, &owner, "submitted").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");

    let (status, body) = set_status(&app, &uri, &admin, "completed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status transition");

    let (status, body) = set_status(&app, &uri, &admin, "approved").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
}

async fn set_status(app: &TestApp, uri: &str, token: &str, status: &str) -> (StatusCode, Value) {
    app.request(Method::PATCH, uri, Some(token), Some(json!({ "status": status })))
        .await
}

#[tokio::test]
async fn test_listings_by_owner_tag_and_status() {
    let app = TestApp::new();
    app.department("PGSO", &[]).await;
    let (_, owner) = app.user(None);
    let (_, member) = app.user(Some("pgso"));
    let (_, outsider) = app.user(Some("PHO"));
    let (_, admin) = app.admin();

    let tagged = app.event(&owner, &["PGSO"], false).await;
    app.event(&owner, &[], true).await;

    let (_, body) = app.get("/api/events/my", &owner).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/events/tagged", &member).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], tagged["id"]);

    let (_, body) = app.get("/api/events/tagged", &outsider).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app.get("/api/events?status=draft", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    let (status, _) = app.get("/api/events", &owner).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_event_visibility() {
    let app = TestApp::new();
    app.department("PGSO", &[]).await;
    let (_, owner) = app.user(None);
    let (_, member) = app.user(Some("PGSO"));
    let (_, outsider) = app.user(None);
    let event = app.event(&owner, &["PGSO"], false).await;
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

    assert_eq!(app.get(&uri, &owner).await.0, StatusCode::OK);
    assert_eq!(app.get(&uri, &member).await.0, StatusCode::OK);
    assert_eq!(app.get(&uri, &outsider).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_owner_updates_location_and_schedule() {
    let app = TestApp::new();
    let (_, owner) = app.user(None);
    let (_, other) = app.user(None);
    let event = app.event(&owner, &[], false).await;
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());
    let update = json!({ "location": "Provincial Gym", "endTime": "18:30:00" });

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&other), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request(Method::PUT, &uri, Some(&owner), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["location"], "Provincial Gym");
    assert_eq!(body["data"]["endTime"], "18:30:00");
    assert_eq!(body["data"]["title"], "Provincial Sports Fest");
}

#[tokio::test]
async fn test_delete_event() {
    let app = TestApp::new();
    let (_, owner) = app.user(None);
    let (_, other) = app.user(None);
    let event = app.event(&owner, &[], false).await;
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

    assert_eq!(
        app.request(Method::DELETE, &uri, Some(&other), None).await.0,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.request(Method::DELETE, &uri, Some(&owner), None).await.0,
        StatusCode::OK
    );
    let (status, body) = app.get(&uri, &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found");
}
