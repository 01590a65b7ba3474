//! Test helper module for admin-service integration tests.
//!
//! Builds the full router over `MemoryStore` + `MockEmailService`, so every
//! test runs without PostgreSQL or an SMTP relay.

#![allow(dead_code)]

use admin_service::{
    build_router,
    config::{
        AdminConfig, ChallengeConfig, DatabaseConfig, Environment, SecurityConfig, SmtpConfig,
    },
    models::{User, UserRole},
    services::{ControlPlaneStore, EmailProvider, MemoryStore, MockEmailService},
    AppState,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

/// Test application over in-memory dependencies.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub email: Arc<MockEmailService>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailService::new());

        let state = AppState::build(
            test_config(),
            store.clone() as Arc<dyn ControlPlaneStore>,
            email.clone() as Arc<dyn EmailProvider>,
        )
        .expect("Failed to build test app state");

        let router = build_router(state.clone());

        TestApp {
            router,
            state,
            store,
            email,
        }
    }

    /// Run one request through a clone of the router.
    pub async fn request(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    pub async fn seed_admin(&self) -> User {
        let admin = User::new(
            format!("admin-{}@example.com", Uuid::new_v4()),
            Some("Test Admin".to_string()),
            UserRole::Admin,
        );
        self.store.insert_user(&admin).await.unwrap();
        admin
    }

    pub async fn seed_member(&self) -> User {
        let member = User::new(
            format!("member-{}@example.com", Uuid::new_v4()),
            None,
            UserRole::Member,
        );
        self.store.insert_user(&member).await.unwrap();
        member
    }

    pub async fn seed_waitlisted(&self) -> User {
        let user = User::waitlisted(format!("wait-{}@example.com", Uuid::new_v4()), None);
        self.store.insert_user(&user).await.unwrap();
        user
    }

    /// Issue a challenge over HTTP and capture the emailed code.
    pub async fn issue_challenge(&self, admin: &User, action: &str) -> (Uuid, String) {
        let response = self
            .request(admin_request(
                Method::POST,
                "/admin/challenges",
                admin.user_id,
                Some(serde_json::json!({ "action": action })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = read_json(response).await;
        let challenge_id = Uuid::parse_str(body["challenge_id"].as_str().unwrap()).unwrap();
        let code = self
            .email
            .last_code()
            .expect("Challenge code should have been emailed");

        (challenge_id, code)
    }
}

/// Create a test configuration.
pub fn test_config() -> AdminConfig {
    AdminConfig {
        common: service_core::config::Config {
            port: 0,
            shutdown_grace_seconds: 0,
        },
        environment: Environment::Dev,
        service_name: "admin-service-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/admin_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            host: "smtp.example.com".to_string(),
            username: "test@example.com".to_string(),
            password: "password".to_string(),
            from_email: "noreply@example.com".to_string(),
        },
        challenge: ChallengeConfig { ttl_minutes: 10 },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_api_key: TEST_ADMIN_API_KEY.to_string(),
        },
        otlp_endpoint: None,
    }
}

/// Build a request carrying the admin API key and acting-admin header.
pub fn admin_request(
    method: Method,
    uri: &str,
    admin_id: Uuid,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Admin-Api-Key", TEST_ADMIN_API_KEY)
        .header("x-admin-id", admin_id.to_string());

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
