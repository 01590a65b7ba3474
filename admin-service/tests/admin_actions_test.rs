//! End-to-end tests for governed admin actions and the audit trail.

mod common;

use axum::http::{Method, StatusCode};
use common::{admin_request, read_json, TestApp};
use serde_json::json;
use uuid::Uuid;

use admin_service::models::PermissionGrant;
use admin_service::services::ControlPlaneStore;

#[tokio::test]
async fn test_confirmed_ban_records_full_audit_entry() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BAN").await;

    let uri = format!("/admin/users/{}/ban", member.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({
                "challenge_id": challenge_id,
                "code": code,
                "reason": "Terms of service violation",
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["user_id"], member.user_id.to_string());
    assert_eq!(body["banned_flag"], true);

    let response = app
        .request(admin_request(
            Method::GET,
            "/admin/audit?action_key=USER_BAN",
            admin.user_id,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    let entry = &body["entries"][0];
    assert_eq!(entry["actor_user_id"], admin.user_id.to_string());
    assert_eq!(entry["action_key"], "USER_BAN");
    assert_eq!(entry["entity_kind"], "user");
    assert_eq!(entry["entity_id"], member.user_id.to_string());
    assert_eq!(entry["target_user_id"], member.user_id.to_string());
    assert_eq!(entry["reason_text"], "Terms of service violation");
    assert_eq!(entry["metadata"]["outcome"], "success");
    assert_eq!(entry["metadata"]["challenge_id"], challenge_id.to_string());
}

#[tokio::test]
async fn test_challenge_replay_rejected() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let first = app.seed_member().await;
    let second = app.seed_member().await;

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BAN").await;

    let uri = format!("/admin/users/{}/ban", first.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Same challenge against a second target must fail
    let uri = format!("/admin/users/{}/ban", second.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["code"], "CHALLENGE_INVALID");

    let untouched = app.store.find_user(second.user_id).await.unwrap().unwrap();
    assert!(!untouched.banned_flag);
}

#[tokio::test]
async fn test_ban_without_confirmation_rejected() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let uri = format!("/admin/users/{}/ban", member.user_id);
    let response = app
        .request(admin_request(Method::POST, &uri, admin.user_id, Some(json!({}))))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["code"], "CHALLENGE_REQUIRED");
    assert_eq!(body["details"], "USER_BAN");

    let untouched = app.store.find_user(member.user_id).await.unwrap().unwrap();
    assert!(!untouched.banned_flag);
}

#[tokio::test]
async fn test_unban_restores_the_user() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BAN").await;
    let uri = format!("/admin/users/{}/ban", member.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_UNBAN").await;
    let uri = format!("/admin/users/{}/unban", member.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["banned_flag"], false);
}

#[tokio::test]
async fn test_role_change_runs_without_confirmation() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let uri = format!("/admin/users/{}/role", member.user_id);
    let response = app
        .request(admin_request(
            Method::PATCH,
            &uri,
            admin.user_id,
            Some(json!({ "role": "staff" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["role_code"], "staff");

    let response = app
        .request(admin_request(
            Method::GET,
            "/admin/audit?action_key=USER_ROLE_CHANGE",
            admin.user_id,
            None,
        ))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    let metadata = &body["entries"][0]["metadata"];
    assert_eq!(metadata["old_role"], "member");
    assert_eq!(metadata["new_role"], "staff");
    assert!(metadata.get("challenge_id").is_none());
}

#[tokio::test]
async fn test_role_change_with_wrong_code_rejected() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_ROLE_CHANGE").await;
    let wrong_code = if code == "000000" { "000001" } else { "000000" };

    let uri = format!("/admin/users/{}/role", member.user_id);
    let response = app
        .request(admin_request(
            Method::PATCH,
            &uri,
            admin.user_id,
            Some(json!({
                "role": "staff",
                "challenge_id": challenge_id,
                "code": wrong_code,
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["code"], "CHALLENGE_CODE_INVALID");

    let untouched = app.store.find_user(member.user_id).await.unwrap().unwrap();
    assert_eq!(untouched.role_code, "member");
}

#[tokio::test]
async fn test_bulk_role_change_skips_unknown_ids() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let first = app.seed_member().await;
    let second = app.seed_member().await;
    let missing = Uuid::new_v4();

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BULK_ROLE_CHANGE").await;

    let response = app
        .request(admin_request(
            Method::POST,
            "/admin/users/role",
            admin.user_id,
            Some(json!({
                "user_ids": [first.user_id, second.user_id, missing],
                "role": "staff",
                "challenge_id": challenge_id,
                "code": code,
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["requested"], 3);
    assert_eq!(body["updated"], 2);
    assert_eq!(body["role"], "staff");

    let updated = app.store.find_user(first.user_id).await.unwrap().unwrap();
    assert_eq!(updated.role_code, "staff");
}

#[tokio::test]
async fn test_failed_ban_leaves_forensic_audit_entry() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let missing = Uuid::new_v4();

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BAN").await;

    let uri = format!("/admin/users/{}/ban", missing);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(admin_request(
            Method::GET,
            "/admin/audit?action_key=USER_BAN",
            admin.user_id,
            None,
        ))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    let entry = &body["entries"][0];
    assert_eq!(entry["metadata"]["outcome"], "failed");
    assert_eq!(entry["metadata"]["challenge_id"], challenge_id.to_string());
    assert_eq!(entry["target_user_id"], missing.to_string());
}

#[tokio::test]
async fn test_audit_query_filters_by_actor() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let other_admin = app.seed_admin().await;
    let member = app.seed_member().await;

    let uri = format!("/admin/users/{}/role", member.user_id);
    let response = app
        .request(admin_request(
            Method::PATCH,
            &uri,
            admin.user_id,
            Some(json!({ "role": "staff" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let uri = format!(
        "/admin/audit?actor_user_id={}",
        other_admin.user_id
    );
    let response = app
        .request(admin_request(Method::GET, &uri, admin.user_id, None))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["total"], 0);

    let uri = format!("/admin/audit?actor_user_id={}", admin.user_id);
    let response = app
        .request(admin_request(Method::GET, &uri, admin.user_id, None))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_audit_limit_is_clamped() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;

    let response = app
        .request(admin_request(
            Method::GET,
            "/admin/audit?limit=100000",
            admin.user_id,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["limit"], 200);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn test_audit_read_needs_audit_view() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let granter = app.seed_admin().await;

    let deny = PermissionGrant::new(
        admin.user_id,
        "audit.view".to_string(),
        false,
        granter.user_id,
    );
    app.store.upsert_grant(&deny).await.unwrap();

    let response = app
        .request(admin_request(Method::GET, "/admin/audit", admin.user_id, None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_denied_permission_blocks_the_action() {
    let app = TestApp::spawn();
    let admin = app.seed_admin().await;
    let granter = app.seed_admin().await;
    let member = app.seed_member().await;

    let deny = PermissionGrant::new(
        admin.user_id,
        "users.ban".to_string(),
        false,
        granter.user_id,
    );
    app.store.upsert_grant(&deny).await.unwrap();

    let (challenge_id, code) = app.issue_challenge(&admin, "USER_BAN").await;

    let uri = format!("/admin/users/{}/ban", member.user_id);
    let response = app
        .request(admin_request(
            Method::POST,
            &uri,
            admin.user_id,
            Some(json!({ "challenge_id": challenge_id, "code": code })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = read_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(body["error"].as_str().unwrap().contains("users.ban"));

    let untouched = app.store.find_user(member.user_id).await.unwrap().unwrap();
    assert!(!untouched.banned_flag);
}
