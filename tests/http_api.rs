//! Router-level tests for the HTTP API
//!
//! Each test builds a fresh in-memory app and drives it with
//! `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use std::time::Duration;

use tower::ServiceExt;

use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, USER_PASSWORD};
use floe_cms::auth::crypto::verify_password;
use floe_cms::auth::Role;
use floe_cms::http_server::{HttpServer, HttpServerConfig, RateLimit};

// =============================================================================
// HEALTH AND MIDDLEWARE
// =============================================================================

#[tokio::test]
async fn test_health_is_public_text() {
    let app = TestApp::new().await;

    let response = app.send(Method::GET, "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "Floe CMS is running");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new().await;

    for uri in ["/api/health", "/api/users"] {
        let response = app.send(Method::GET, uri, None, None).await;
        let headers = &response.headers;

        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=31536000; includeSubDomains"
        );
        assert!(headers.contains_key("content-security-policy"));
    }
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header(header::ORIGIN, "https://editor.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.send_request(request).await;

    assert!(response.status.is_success());
    assert_eq!(response.headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_requests_over_budget_get_429() {
    let app = TestApp::new().await;
    let config = HttpServerConfig {
        rate_limit: RateLimit {
            requests: 2,
            window: Duration::from_secs(60),
        },
        ..HttpServerConfig::default()
    };
    let router = HttpServer::with_config(config, app.state.clone()).router();

    let health = || Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    for _ in 0..2 {
        let response = router.clone().oneshot(health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router.clone().oneshot(health()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Too many requests");
}

// =============================================================================
// LOGIN
// =============================================================================

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = TestApp::new().await;

    let data = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    assert!(data["access_token"].as_str().unwrap().split('.').count() == 3);
    assert_eq!(data["refresh_token"].as_str().unwrap().len(), 64);
    assert!(data["expires_at"].is_string());
}

#[tokio::test]
async fn test_login_rejections() {
    let app = TestApp::new().await;

    let response = app
        .send(Method::POST, "/api/auth/login", None, Some(json!({ "email": ADMIN_EMAIL })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "Email and password are required");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send_request(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid request payload");

    let wrong_password = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "not-the-password" })),
        )
        .await;
    let unknown_email = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@floe.cms", "password": ADMIN_PASSWORD })),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
}

#[tokio::test]
async fn test_deactivated_user_cannot_log_in() {
    let app = TestApp::new().await;
    let user = app.create_user("viewer@floe.cms", Role::Viewer).await;
    let admin = app.admin_token().await;

    let response = app
        .send(
            Method::PUT,
            &format!("/api/users/{}", user.id),
            Some(&admin),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["active"], false);

    let response = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "viewer@floe.cms", "password": USER_PASSWORD })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "user account is deactivated");
}

// =============================================================================
// AUTHENTICATION AND ROLES
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = TestApp::new().await;

    let response = app.send(Method::GET, "/api/me", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Authorization header required");

    let request = Request::builder()
        .uri("/api/me")
        .header(header::AUTHORIZATION, "Basic YWRtaW46YWRtaW4=")
        .body(Body::empty())
        .unwrap();
    let response = app.send_request(request).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid Authorization header format");

    let response = app.send(Method::GET, "/api/me", Some("not.a.token"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_tampered_access_token_rejected() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    // Inside the signature, away from the final character's padding bits
    let mut tampered = token.into_bytes();
    let target = tampered.len() - 10;
    tampered[target] = if tampered[target] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = app.send(Method::GET, "/api/me", Some(&tampered), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_by_role() {
    let app = TestApp::new().await;
    app.create_user("viewer@floe.cms", Role::Viewer).await;
    app.create_user("editor@floe.cms", Role::Editor).await;

    let admin = app.admin_token().await;
    let response = app.send(Method::GET, "/api/users", Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["total"], 3);
    assert_eq!(response.body["data"]["limit"], 10);
    assert_eq!(response.body["data"]["offset"], 0);
    assert!(response.body["data"]["users"][0].get("password_hash").is_none());

    for email in ["viewer@floe.cms", "editor@floe.cms"] {
        let token = app.access_token(email, USER_PASSWORD).await;
        let response = app.send(Method::GET, "/api/users", Some(&token), None).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body["error"], "Admin access required");
    }
}

#[tokio::test]
async fn test_list_users_filters_and_pages() {
    let app = TestApp::new().await;
    for i in 0..3 {
        app.create_user(&format!("editor{}@floe.cms", i), Role::Editor).await;
    }
    let admin = app.admin_token().await;

    let response = app
        .send(Method::GET, "/api/users?role=editor&limit=2&offset=1", Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["total"], 3);
    assert_eq!(response.body["data"]["users"].as_array().unwrap().len(), 2);

    let response = app
        .send(Method::GET, "/api/users?role=owner", Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// USER ADMINISTRATION
// =============================================================================

#[tokio::test]
async fn test_admin_creates_and_fetches_user() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({
                "email": "writer@floe.cms",
                "password": USER_PASSWORD,
                "first_name": "Wren",
                "role": "editor"
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.body["data"]["id"].as_i64().unwrap();

    let response = app
        .send(Method::GET, &format!("/api/users/{}", id), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["email"], "writer@floe.cms");
    assert_eq!(response.body["data"]["first_name"], "Wren");

    let duplicate = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "email": "writer@floe.cms", "password": USER_PASSWORD })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let weak = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "email": "weak@floe.cms", "password": "short" })),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let missing = app.send(Method::GET, "/api/users/9999", Some(&admin), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_ids_get_error_envelope() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    for (method, uri) in [
        (Method::GET, "/api/users/abc"),
        (Method::DELETE, "/api/users/1x"),
        (Method::GET, "/api/workspaces/abc"),
        (Method::DELETE, "/api/workspaces/1/users/abc"),
    ] {
        let response = app.send(method, uri, Some(&admin), None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.body["success"], false, "{uri}");
        assert_eq!(response.body["error"], "Invalid ID", "{uri}");
    }
}

#[tokio::test]
async fn test_last_admin_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let first_admin_id = app.bootstrap.admin.id;

    let response = app
        .send(Method::DELETE, &format!("/api/users/{}", first_admin_id), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "cannot delete the last admin user");

    let demote = app
        .send(
            Method::PUT,
            &format!("/api/users/{}", first_admin_id),
            Some(&admin),
            Some(json!({ "role": "viewer" })),
        )
        .await;
    assert_eq!(demote.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        demote.body["error"],
        "cannot demote or deactivate the last admin user"
    );

    app.create_user("second-admin@floe.cms", Role::Admin).await;

    let response = app
        .send(Method::DELETE, &format!("/api/users/{}", first_admin_id), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["message"], "User deleted successfully");

    let response = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleting_user_revokes_refresh_tokens() {
    let app = TestApp::new().await;
    let user = app.create_user("leaving@floe.cms", Role::Editor).await;
    let session = app.login("leaving@floe.cms", USER_PASSWORD).await;
    let admin = app.admin_token().await;

    let response = app
        .send(Method::DELETE, &format!("/api/users/{}", user.id), Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": session["refresh_token"] })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// CURRENT USER
// =============================================================================

#[tokio::test]
async fn test_me_returns_user_and_workspaces() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app.send(Method::GET, "/api/me", Some(&admin), None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["user"]["email"], ADMIN_EMAIL);
    assert!(response.body["data"]["user"].get("password_hash").is_none());
    assert_eq!(response.body["data"]["workspaces"][0]["slug"], "default");
}

#[tokio::test]
async fn test_update_profile() {
    let app = TestApp::new().await;
    app.create_user("profile@floe.cms", Role::Viewer).await;
    let token = app.access_token("profile@floe.cms", USER_PASSWORD).await;

    let response = app
        .send(
            Method::PUT,
            "/api/me",
            Some(&token),
            Some(json!({ "first_name": "Rowan", "last_name": "" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["first_name"], "Rowan");
    assert_eq!(response.body["data"]["last_name"], "User");

    let response = app
        .send(Method::PUT, "/api/me", Some(&token), Some(json!({ "email": "not-an-email" })))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password_requires_current_password() {
    let app = TestApp::new().await;
    let user = app.create_user("rotate@floe.cms", Role::Editor).await;
    let token = app.access_token("rotate@floe.cms", USER_PASSWORD).await;

    let response = app
        .send(
            Method::PUT,
            "/api/me/password",
            Some(&token),
            Some(json!({ "old_password": "Wrong-Pass1", "new_password": "Brand-New-Pass2" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid current password");

    let stored = app.state.accounts.get_user(user.id).await.unwrap();
    assert_eq!(stored.password_hash, user.password_hash);

    let response = app
        .send(
            Method::PUT,
            "/api/me/password",
            Some(&token),
            Some(json!({ "old_password": USER_PASSWORD, "new_password": "weak" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Method::PUT,
            "/api/me/password",
            Some(&token),
            Some(json!({ "old_password": USER_PASSWORD, "new_password": "Brand-New-Pass2" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["message"], "Password changed successfully");

    let stored = app.state.accounts.get_user(user.id).await.unwrap();
    assert!(verify_password("Brand-New-Pass2", &stored.password_hash));
    assert!(!verify_password(USER_PASSWORD, &stored.password_hash));
}

// =============================================================================
// REFRESH AND LOGOUT
// =============================================================================

#[tokio::test]
async fn test_refresh_then_logout() {
    let app = TestApp::new().await;
    let session = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let refresh_token = session["refresh_token"].as_str().unwrap().to_string();
    let access_token = session["access_token"].as_str().unwrap().to_string();

    let response = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["data"]["access_token"].is_string());
    assert!(response.body["data"].get("refresh_token").is_none());

    let response = app
        .send(
            Method::POST,
            "/api/auth/logout",
            Some(&access_token),
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["message"], "Logged out successfully");

    // Revoking an already revoked token still succeeds
    let response = app
        .send(
            Method::POST,
            "/api/auth/logout",
            Some(&access_token),
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "invalid refresh token");
}

#[tokio::test]
async fn test_logout_edge_cases() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let response = app
        .send(
            Method::POST,
            "/api/auth/logout",
            Some(&token),
            Some(json!({ "refresh_token": "0".repeat(64) })),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .send(Method::POST, "/api/auth/logout", Some(&token), Some(json!({})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Refresh token is required");

    let response = app
        .send(
            Method::POST,
            "/api/auth/logout",
            None,
            Some(json!({ "refresh_token": "anything" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_reflects_current_role() {
    let app = TestApp::new().await;
    let user = app.create_user("promoted@floe.cms", Role::Viewer).await;
    let session = app.login("promoted@floe.cms", USER_PASSWORD).await;
    let admin = app.admin_token().await;

    app.send(
        Method::PUT,
        &format!("/api/users/{}", user.id),
        Some(&admin),
        Some(json!({ "role": "admin" })),
    )
    .await;

    let response = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": session["refresh_token"] })),
        )
        .await;
    let new_access = response.body["data"]["access_token"].as_str().unwrap().to_string();

    let response = app.send(Method::GET, "/api/users", Some(&new_access), None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_refresh_tokens_are_single_use() {
    let app = TestApp::with_rotation(true).await;
    let session = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let original = session["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .send(Method::POST, "/api/auth/refresh", None, Some(json!({ "refresh_token": original })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let rotated = response.body["data"]["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, original);

    let replay = app
        .send(Method::POST, "/api/auth/refresh", None, Some(json!({ "refresh_token": original })))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let response = app
        .send(Method::POST, "/api/auth/refresh", None, Some(json!({ "refresh_token": rotated })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

// =============================================================================
// WORKSPACES
// =============================================================================

#[tokio::test]
async fn test_workspace_administration() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.create_user("member@floe.cms", Role::Editor).await;

    let response = app
        .send(Method::POST, "/api/workspaces", Some(&admin), Some(json!({ "name": "Marketing Site" })))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["slug"], "marketing-site");
    let workspace_id = response.body["data"]["id"].as_i64().unwrap();

    let duplicate = app
        .send(Method::POST, "/api/workspaces", Some(&admin), Some(json!({ "name": "Marketing Site" })))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let unnamed = app
        .send(Method::POST, "/api/workspaces", Some(&admin), Some(json!({ "name": "  " })))
        .await;
    assert_eq!(unnamed.status, StatusCode::BAD_REQUEST);
    assert_eq!(unnamed.body["error"], "Name is required");

    let members_uri = format!("/api/workspaces/{}/users", workspace_id);
    let response = app
        .send(Method::POST, &members_uri, Some(&admin), Some(json!({ "user_id": user.id })))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["message"], "User added to workspace successfully");

    let again = app
        .send(Method::POST, &members_uri, Some(&admin), Some(json!({ "user_id": user.id })))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let remove_uri = format!("/api/workspaces/{}/users/{}", workspace_id, user.id);
    let response = app.send(Method::DELETE, &remove_uri, Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["message"], "User removed from workspace successfully");

    let response = app.send(Method::DELETE, &remove_uri, Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.send(Method::GET, "/api/workspaces", Some(&admin), None).await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_workspace_update_and_delete() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.create_user("writer@floe.cms", Role::Editor).await;
    let token = app.access_token("writer@floe.cms", USER_PASSWORD).await;

    let response = app
        .send(Method::POST, "/api/workspaces", Some(&admin), Some(json!({ "name": "Docs" })))
        .await;
    let workspace_id = response.body["data"]["id"].as_i64().unwrap();
    let uri = format!("/api/workspaces/{}", workspace_id);

    let response = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "name": "Handbook", "slug": "handbook", "description": "Guides" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["name"], "Handbook");
    assert_eq!(response.body["data"]["slug"], "handbook");
    assert_eq!(response.body["data"]["description"], "Guides");

    let taken = app
        .send(Method::PUT, &uri, Some(&admin), Some(json!({ "slug": "default" })))
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let forbidden = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    app.send(
        Method::POST,
        &format!("{}/users", uri),
        Some(&admin),
        Some(json!({ "user_id": user.id })),
    )
    .await;

    let response = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["message"], "Workspace deleted successfully");

    let response = app.send(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    // The member no longer sees the workspace
    let response = app.send(Method::GET, "/api/me", Some(&token), None).await;
    assert!(response.body["data"]["workspaces"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_workspace_gate() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let user = app.create_user("outsider@floe.cms", Role::Editor).await;
    let token = app.access_token("outsider@floe.cms", USER_PASSWORD).await;
    let workspace_id = app.bootstrap.workspace.id;
    let uri = format!("/api/members?workspace_id={}", workspace_id);

    let response = app.send(Method::GET, "/api/members", Some(&token), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Workspace ID required");

    let response = app
        .send(Method::GET, "/api/members?workspace_id=abc", Some(&token), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid workspace ID");

    let response = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Access denied to this workspace");

    app.send(
        Method::POST,
        &format!("/api/workspaces/{}/users", workspace_id),
        Some(&admin),
        Some(json!({ "user_id": user.id })),
    )
    .await;

    // Membership is checked live, so the existing token now passes
    let response = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["workspace_id"], workspace_id);
    assert_eq!(response.body["data"]["members"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_bypasses_workspace_membership() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let response = app
        .send(Method::POST, "/api/workspaces", Some(&admin), Some(json!({ "name": "Docs" })))
        .await;
    let workspace_id = response.body["data"]["id"].as_i64().unwrap();

    let response = app
        .send(
            Method::GET,
            &format!("/api/members?workspace_id={}", workspace_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["data"]["members"].as_array().unwrap().is_empty());
}
