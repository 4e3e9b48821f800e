//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! over an engine wired to mock chat platform collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use warden_core::testing::TestHarness;
use warden_core::{load_config_from_str, ArchivalScheduler, SchedulerConfig};
use warden_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use warden_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// The harness exposes the mock channel provider, notifier, member directory,
/// transcript store and clock behind the router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_ticket_creation() {
///     let fixture = TestFixture::configured().await;
///
///     let response = fixture.post("/api/v1/guilds/100/tickets", json!({
///         "user_id": 1,
///         "ticket_type": "support"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Engine, stores and mocks behind the router
    pub harness: TestHarness,
    pub scheduler: Arc<ArchivalScheduler>,
    /// Key sent with every request, if any
    pub api_key: Option<String>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a fixture without an API key and without guild configs.
    pub async fn new() -> Self {
        Self::with_api_key(None).await
    }

    /// Create a fixture with the default members and the fixture guild config.
    pub async fn configured() -> Self {
        let fixture = Self::new().await;
        fixture
            .harness
            .configure(fixtures::guild_config(fixtures::GUILD))
            .await;
        fixture
    }

    /// Create a fixture whose server requires `api_key`.
    pub async fn with_api_key(api_key: Option<&str>) -> Self {
        let mut toml = String::from("[discord]\nbot_token = \"test-token\"\n");
        if let Some(key) = api_key {
            toml.push_str(&format!("[api]\nkey = \"{}\"\n", key));
        }
        let config = load_config_from_str(&toml).expect("Failed to parse test config");

        let harness = TestHarness::new().with_default_members().await;
        let scheduler = Arc::new(harness.scheduler(SchedulerConfig::default()));

        let state = Arc::new(AppState::new(
            config,
            harness.engine.clone(),
            Arc::clone(&scheduler),
        ));
        let router = create_router(state);

        Self {
            router,
            harness,
            scheduler,
            api_key: api_key.map(str::to_string),
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Open a ticket for `user_id` in the fixture guild.
    pub async fn open_ticket(&self, user_id: u64) -> TestResponse {
        self.post(
            &format!("/api/v1/guilds/{}/tickets", fixtures::GUILD),
            json!({ "user_id": user_id, "ticket_type": "support" }),
        )
        .await
    }

    /// Send a request to the test server.
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(key) = &self.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", key));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
