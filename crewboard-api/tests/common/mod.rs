/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An in-memory store behind a fully built router
/// - Test user creation and token generation
/// - Request helpers returning status, headers and the parsed JSON body

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use crewboard_api::app::{build_router, AppState};
use crewboard_api::config::{ApiConfig, AuthConfig, Config};
use crewboard_shared::auth::jwt::{create_token, Claims};
use crewboard_shared::auth::password::hash_password;
use crewboard_shared::models::user::{NewUser, User};
use crewboard_shared::store::{MemoryStore, RedisConfig};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tower::Service as _;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret-key-at-least-32-bytes";
pub const PASSWORD: &str = "password123";

/// Argon2 is slow in debug builds; hash the shared password once
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        redis: RedisConfig::with_url("redis://localhost:6379"),
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
            token_ttl_secs: 7200,
            cookie_secure: false,
        },
    }
}

/// Parsed response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `error.message` of a fail envelope
    pub fn message(&self) -> &str {
        self.body["error"]["message"].as_str().unwrap_or_default()
    }
}

/// A registered user with a valid token
pub struct TestUser {
    pub user: User,
    pub token: String,
}

/// Test context containing the router and its store
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub app: axum::Router,
}

impl TestContext {
    /// Creates a new test context over an empty store
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), test_config());
        let app = build_router(state.clone());

        Self { store, state, app }
    }

    /// Registers a user directly through the directory
    pub async fn user(&self, first_name: &str, email: &str) -> TestUser {
        let user = self
            .state
            .users
            .create(NewUser {
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                email: email.to_string(),
                password_hash: password_hash(),
            })
            .await
            .unwrap()
            .expect("email already registered");

        let claims = Claims::new(user.id, user.email.clone());
        let token = create_token(&claims, SECRET).unwrap();

        TestUser { user, token }
    }

    /// Sends a request, authenticating with a Bearer token when given
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.dispatch(request).await
    }

    /// Sends a prepared request
    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().call(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Creates a project through the API and returns its id
    pub async fn create_project(&self, owner: &TestUser, title: &str, team: Value) -> Uuid {
        let response = self
            .send(
                Method::POST,
                "/api/v1/project",
                Some(&owner.token),
                Some(serde_json::json!({
                    "title": title,
                    "description": "A project for integration tests",
                    "team": team,
                })),
            )
            .await;

        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["data"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap()
    }
}

/// Team member ids of a project in a response body
pub fn team_ids(body: &Value) -> Vec<String> {
    let mut ids: Vec<String> = body["data"]["team"]
        .as_array()
        .map(|team| {
            team.iter()
                .filter_map(|member| member["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    ids.sort();
    ids
}
