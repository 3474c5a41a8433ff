use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use hendry_template::api::handlers::AppState;
use hendry_template::api::routes::create_router;
use hendry_template::config::Environment;
use hendry_template::logic::Behaviors;
use hendry_template::store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(store: Arc<MemoryStore>, environment: Environment) -> Router {
    create_router::<MemoryStore>(environment).with_state(AppState::new(
        store,
        environment,
        Behaviors::default(),
    ))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let app = app(Arc::new(MemoryStore::new()), Environment::Development);
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_user_returns_created_data() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), Environment::Development);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user",
        Some(json!({ "data": { "id": "", "userName": "alice", "password": "pw" } })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["userName"], "alice");
    assert_eq!(body["data"]["password"], "pw");
    assert!(body["data"]["id"].as_str().is_some());
    assert!(body["data"]["createdAt"].as_str().is_some());
    assert_eq!(store.len("User"), 1);
}

#[tokio::test]
async fn test_create_user_validation_problem() {
    let app = app(Arc::new(MemoryStore::new()), Environment::Production);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/user",
        Some(json!({ "data": { "id": "not-empty" } })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], 422);
    assert_eq!(body["errors"]["id"][0], "'Id' must be empty.");
    assert_eq!(body["errors"]["userName"][0], "'User Name' must not be empty.");
    assert_eq!(body["errors"]["password"][0], "'Password' must not be empty.");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = app(Arc::new(MemoryStore::new()), Environment::Development);

    let (status, body) = call(&app, Method::POST, "/api/user", Some(json!({ "user": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_get_patch_delete_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), Environment::Development);

    let (_, created) = call(
        &app,
        Method::POST,
        "/api/user",
        Some(json!({ "data": {
            "userName": "bob",
            "password": "pw",
            "addresses": [{ "label": "home", "street": "Main St 1", "city": "Lund" }]
        } })),
    )
    .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/user/{}", id);

    let (status, fetched) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["addresses"][0]["city"], "Lund");

    let (status, trimmed) = call(&app, Method::GET, &format!("{}?include=profile", uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trimmed["addresses"], json!([]));

    let (status, patched) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "data": { "email": "bob@example.com", "tags": ["a", "b"] } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["userName"], "bob");
    assert_eq!(patched["email"], "bob@example.com");
    assert_eq!(patched["tags"], "a;b");
    assert_eq!(patched["addresses"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, missing) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["status"], 404);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_invalid_path_id_is_bad_request() {
    let app = app(Arc::new(MemoryStore::new()), Environment::Development);
    let (status, body) = call(&app, Method::GET, "/api/user/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("not a valid identifier"));
}

#[tokio::test]
async fn test_list_users_filters_by_name() {
    let app = app(Arc::new(MemoryStore::new()), Environment::Development);
    for name in ["zoe", "adam", "zack"] {
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/user",
            Some(json!({ "data": { "userName": name, "password": "pw" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, all) = call(&app, Method::GET, "/api/user", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], 3);
    assert_eq!(all["items"][0]["userName"], "adam");

    let (_, filtered) = call(&app, Method::GET, "/api/user?userName=z", None).await;
    assert_eq!(filtered["total"], 2);
    assert_eq!(filtered["items"][0]["userName"], "zack");
}

#[tokio::test]
async fn test_docs_only_in_development() {
    let development = app(Arc::new(MemoryStore::new()), Environment::Development);
    let (status, spec) = call(&development, Method::GET, "/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/api/user"].is_object());

    let production = app(Arc::new(MemoryStore::new()), Environment::Production);
    let response = production
        .oneshot(
            Request::builder()
                .uri("/docs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
