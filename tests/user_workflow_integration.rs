use std::sync::Arc;

use hendry_template::config::{AppConfig, Environment, StorageBackend};
use hendry_template::serve_with_store;
use hendry_template::store::MemoryStore;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .delete(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn patch(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .patch(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }
}

async fn spawn_server(environment: Environment) -> TestClient {
    let config = AppConfig {
        storage: StorageBackend::Memory,
        environment,
        ..AppConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        serve_with_store(listener, Arc::new(MemoryStore::new()), &config)
            .await
            .unwrap();
    });

    TestClient::new(format!("http://{}", address))
}

#[tokio::test]
async fn test_user_complete_workflow() {
    let client = spawn_server(Environment::Development).await;

    let health = client.get("/health").await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    // Create
    let response = client
        .post(
            "/api/user",
            json!({ "data": {
                "id": "",
                "userName": "alice",
                "password": "pw",
                "profile": { "displayName": "Alice" },
                "permissions": ["read"],
                "addresses": [{ "label": "home", "street": "Main St 1", "city": "Lund" }]
            } }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    let address_id = created["data"]["addresses"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["profile"]["displayName"], "Alice");

    // Duplicate user name
    let response = client
        .post("/api/user", json!({ "data": { "userName": "alice", "password": "x" } }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let problem: Value = response.json().await.unwrap();
    assert_eq!(problem["errors"]["userName"][0], "User name 'alice' is already taken.");

    // Partial update keeps the address and adds another
    let response = client
        .patch(
            &format!("/api/user/{}", id),
            json!({ "data": {
                "id": id,
                "profile": { "bio": "Cartographer" },
                "addresses": [
                    { "id": address_id, "city": "Malmö" },
                    { "label": "work", "street": "Dock 4", "city": "Malmö" }
                ]
            } }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["profile"]["displayName"], "Alice");
    assert_eq!(updated["profile"]["bio"], "Cartographer");
    assert_eq!(updated["addresses"][0]["id"], address_id.as_str());
    assert_eq!(updated["addresses"][0]["label"], "home");
    assert_eq!(updated["addresses"][0]["city"], "Malmö");
    assert_eq!(updated["addresses"].as_array().unwrap().len(), 2);
    assert_eq!(updated["createdAt"], created["data"]["createdAt"]);

    // Unknown child id
    let stranger = uuid::Uuid::new_v4();
    let response = client
        .patch(
            &format!("/api/user/{}", id),
            json!({ "data": { "addresses": [{ "id": stranger.to_string() }] } }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // List
    let response = client.get("/api/user").await.unwrap();
    let listed: Value = response.json().await.unwrap();
    assert_eq!(listed["total"], 1);

    // Delete
    let response = client.delete(&format!("/api/user/{}", id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = client.get(&format!("/api/user/{}", id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_production_hides_docs_and_shortens_messages() {
    let client = spawn_server(Environment::Production).await;

    let response = client.get("/docs").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let missing = uuid::Uuid::new_v4();
    let response = client.get(&format!("/api/user/{}", missing)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let problem: Value = response.json().await.unwrap();
    assert_eq!(
        problem["detail"],
        format!(
            "Exception has been raised: Entity \"User\" ({}) was not found.",
            missing
        )
    );
    assert!(problem.get("errors").is_none());
}
