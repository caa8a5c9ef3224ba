//! Shared harness for router-level tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use floe_cms::auth::accounts::CreateUser;
use floe_cms::auth::bootstrap::{ensure_admin_exists, BootstrapReport};
use floe_cms::auth::crypto::PasswordPolicy;
use floe_cms::auth::{JwtConfig, Repositories, Role, SessionConfig, User};
use floe_cms::http_server::{AppState, HttpServer, HttpServerConfig};

pub const ADMIN_EMAIL: &str = "admin@floe.cms";
pub const ADMIN_PASSWORD: &str = "adminpassword";
pub const USER_PASSWORD: &str = "Member-Pass1";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub bootstrap: BootstrapReport,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    /// In-memory app with the admin account and default workspace seeded
    pub async fn new() -> Self {
        Self::with_rotation(false).await
    }

    pub async fn with_rotation(rotate: bool) -> Self {
        let repos = Repositories::in_memory();
        Self::with_repositories(repos, rotate).await
    }

    pub async fn with_repositories(repos: Repositories, rotate: bool) -> Self {
        let bootstrap = ensure_admin_exists(&repos, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap();

        let mut session = SessionConfig::new(JwtConfig::new("integration-test-secret"));
        session.rotate_refresh_tokens = rotate;

        let state = AppState::new(repos, session, PasswordPolicy::default());
        let router = HttpServer::with_config(HttpServerConfig::default(), state.clone()).router();

        Self {
            router,
            state,
            bootstrap,
        }
    }

    pub async fn create_user(&self, email: &str, role: Role) -> User {
        self.state
            .accounts
            .create_user(CreateUser {
                email: email.to_string(),
                password: USER_PASSWORD.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                role,
            })
            .await
            .unwrap()
    }

    /// Log in over HTTP and return the `data` object
    pub async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        response.body["data"].clone()
    }

    pub async fn admin_token(&self) -> String {
        self.access_token(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn access_token(&self, email: &str, password: &str) -> String {
        self.login(email, password).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
