#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use event_scheduler_server::config::Config;
use event_scheduler_server::routes::create_routes;
use event_scheduler_server::state::AppState;
use event_scheduler_server::store::MemoryStore;
use event_scheduler_server::utils::auth::{issue_token, Role};

const SECRET: &str = "test-secret";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::new(Config::local(SECRET), MemoryStore::new());
        let router = create_routes(state.clone());
        Self { state, router }
    }

    pub fn admin(&self) -> (Uuid, String) {
        self.user_with(Role::Admin, None)
    }

    pub fn user(&self, department: Option<&str>) -> (Uuid, String) {
        self.user_with(Role::User, department)
    }

    fn user_with(&self, role: Role, department: Option<&str>) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = issue_token(
            &self.state.config,
            id,
            format!("{id}@example.gov"),
            department.map(str::to_string),
            role,
        )
        .unwrap();
        (id, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Creates a department as a fresh admin and returns its JSON.
    pub async fn department(&self, name: &str, requirements: &[&str]) -> Value {
        let (_, admin) = self.admin();
        let (status, body) = self
            .post(
                "/api/departments",
                &admin,
                json!({ "name": name, "requirements": requirements }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    /// Creates an event owned by the token's user and returns its JSON.
    pub async fn event(&self, token: &str, tagged: &[&str], as_draft: bool) -> Value {
        let (status, body) = self.post("/api/events", token, event_body(tagged, as_draft)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

pub fn event_body(tagged: &[&str], as_draft: bool) -> Value {
    json!({
        "title": "Provincial Sports Fest",
        "requestor": "Juan Dela Cruz",
        "location": "Capitol Grounds",
        "participants": 120,
        "vip": 2,
        "startDate": "2030-03-01",
        "startTime": "08:00:00",
        "endDate": "2030-03-01",
        "endTime": "17:00:00",
        "contactNumber": "09171234567",
        "contactEmail": "juan@example.gov",
        "taggedDepartments": tagged,
        "asDraft": as_draft
    })
}
