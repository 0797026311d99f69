mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["message"], "Event Scheduler API is running");
}

#[tokio::test]
async fn test_department_names_are_case_insensitive_unique() {
    let app = TestApp::new();
    let (_, admin) = app.admin();

    let (status, body) = app.post("/api/departments", &admin, json!({ "name": " pgso " })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "PGSO");
    assert_eq!(body["data"]["isVisible"], true);

    let (status, body) = app.post("/api/departments", &admin, json!({ "name": "PGSO" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Department already exists");
}

#[tokio::test]
async fn test_department_admin_routes_require_admin() {
    let app = TestApp::new();
    let (_, user) = app.user(Some("PGSO"));

    let (status, body) = app
        .request(Method::GET, "/api/departments", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");

    let (status, body) = app.post("/api/departments", &user, json!({ "name": "GSO" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let app = TestApp::new();
    let (_, admin) = app.admin();

    let (status, body) = app.post("/api/departments", &admin, json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_visible_listing_and_visibility_toggle() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let (_, user) = app.user(None);
    let hidden = app.department("PHO", &[]).await;
    app.department("PGSO", &[]).await;

    let id = hidden["id"].as_str().unwrap();
    let uri = format!("/api/departments/{id}/visibility");

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&admin), Some(json!({ "isVisible": "no" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "isVisible must be a boolean value");

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&admin), Some(json!({ "isVisible": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isVisible"], false);

    let (status, body) = app.get("/api/departments/visible", &user).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["PGSO"]);
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    for name in ["PGSO", "PHO", "PEO", "GSO"] {
        app.department(name, &[]).await;
    }

    let (status, body) = app.get("/api/departments?search=p&page=2&limit=2", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["pages"], 2);
    assert_eq!(body["pagination"]["current"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["name"], "PHO");
}

#[tokio::test]
async fn test_requirement_lifecycle() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let department = app.department("PGSO", &["Chairs"]).await;
    let id = department["id"].as_str().unwrap();
    let uri = format!("/api/departments/{id}/requirements");

    let (status, body) = app.post(&uri, &admin, json!({ "requirement": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Requirement text is required");

    let (status, body) = app.post(&uri, &admin, json!({ "requirement": "Tables" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let requirement_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get(&uri, &admin).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let delete_uri = format!("{uri}/{requirement_id}");
    let (status, _) = app.request(Method::DELETE, &delete_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::DELETE, &delete_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Requirement not found");
}

#[tokio::test]
async fn test_delete_department() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let department = app.department("PGSO", &[]).await;
    let uri = format!("/api/departments/{}", department["id"].as_str().unwrap());

    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Department not found");
}

#[tokio::test]
async fn test_sync_creates_missing_only() {
    let app = TestApp::new();
    let (_, admin) = app.admin();
    let existing = app.department("PGSO", &[]).await;

    let (status, body) = app
        .post(
            "/api/departments/sync",
            &admin,
            json!({ "departments": [{ "name": "pgso" }, { "name": "PHO", "isVisible": false }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let synced = body["data"].as_array().unwrap();
    assert_eq!(synced.len(), 2);
    assert_eq!(synced[0]["id"], existing["id"]);
    assert_eq!(synced[1]["name"], "PHO");
    assert_eq!(synced[1]["isVisible"], false);
}

#[tokio::test]
async fn test_malformed_path_is_validation_error() {
    let app = TestApp::new();
    let (_, admin) = app.admin();

    let (status, body) = app.get("/api/departments/not-a-uuid/requirements", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
