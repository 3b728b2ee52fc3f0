#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, unreachable_pub)]

mod common;

use common::TestApp;
use ipbound_auth::services::credential_codec::CredentialCodec;
use ipbound_auth::services::token_store::RefreshTokenStore;
use reqwest::StatusCode;
use serde_json::json;
use std::net::IpAddr;
use std::time::Duration;
use uuid::Uuid;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    // 1. Issue initial tokens
    let (access_token_1, refresh_token_1) = app.issue(user_id, "1.1.1.1").await;
    assert!(!access_token_1.is_empty());

    let (token_id, _) = CredentialCodec::decode_refresh_token(&refresh_token_1).unwrap();
    let record = app.store.get(token_id).await.unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.issued_ip, ip("1.1.1.1"));
    assert!(!record.is_used);

    // 2. Rotate
    let resp = app.refresh(&refresh_token_1, "1.1.1.1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = resp.json().await.unwrap();
    let refresh_token_2 = json["refreshToken"].as_str().unwrap().to_string();
    assert!(json["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert_ne!(refresh_token_1, refresh_token_2, "Refresh token should rotate");

    // 3. The old token is burned, the new one works
    let resp_old = app.refresh(&refresh_token_1, "1.1.1.1").await;
    assert_eq!(resp_old.status(), StatusCode::UNAUTHORIZED, "Old refresh token should be invalidated");

    let resp_new = app.refresh(&refresh_token_2, "1.1.1.1").await;
    assert_eq!(resp_new.status(), StatusCode::OK);

    assert!(app.notifier.calls().is_empty());
}

#[tokio::test]
async fn test_ip_change_triggers_warning() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();
    let (_, refresh_token) = app.issue(user_id, "1.1.1.1").await;

    let resp = app.refresh(&refresh_token, "2.2.2.2").await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(app.notifier.calls(), vec![(user_id, ip("1.1.1.1"), ip("2.2.2.2"))]);

    let replay = app.refresh(&refresh_token, "2.2.2.2").await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.notifier.calls().len(), 1);
}

#[tokio::test]
async fn test_untrusted_forwarded_header_is_ignored() {
    let mut config = common::get_test_config(3600);
    config.server.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];
    let app = TestApp::spawn_with_config(config).await;

    let (_, refresh_token) = app.issue(Uuid::new_v4(), "1.1.1.1").await;
    let (token_id, _) = CredentialCodec::decode_refresh_token(&refresh_token).unwrap();

    let record = app.store.get(token_id).await.unwrap();
    assert_eq!(record.issued_ip, ip("127.0.0.1"));
}

#[tokio::test]
async fn test_create_tokens_rejects_bad_input() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/auth/tokens", app.server_url))
        .json(&json!({ "userId": "not-a-uuid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid user ID");

    let resp = app
        .client
        .post(format!("{}/v1/auth/tokens", app.server_url))
        .json(&json!({ "somethingElse": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_refresh_failures_are_indistinguishable() {
    let app = TestApp::spawn_with_config(common::get_test_config(0)).await;
    let (_, expired_token) = app.issue(Uuid::new_v4(), "1.1.1.1").await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let secret = CredentialCodec::generate_refresh_secret().unwrap();
    let unknown_token = CredentialCodec::encode_refresh_token(Uuid::new_v4(), &secret);

    let mut bodies = Vec::new();
    for token in ["garbage", unknown_token.as_str(), expired_token.as_str()] {
        let resp = app.refresh(token, "1.1.1.1").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "token {token:?}");
        bodies.push(resp.text().await.unwrap());
    }

    assert!(bodies.windows(2).all(|w| w[0] == w[1]), "bodies differ: {bodies:?}");
}

#[tokio::test]
async fn test_concurrent_refresh_single_winner() {
    let app = TestApp::spawn().await;
    let (_, refresh_token) = app.issue(Uuid::new_v4(), "1.1.1.1").await;

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let client = app.client.clone();
        let url = format!("{}/v1/auth/refresh", app.server_url);
        let body = json!({ "refreshToken": refresh_token });
        set.spawn(async move {
            client.post(url).header("x-forwarded-for", "1.1.1.1").json(&body).send().await.unwrap().status()
        });
    }

    let statuses: Vec<StatusCode> = set.join_all().await;
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1, "statuses: {statuses:?}");
    assert!(statuses.iter().all(|s| *s == StatusCode::OK || *s == StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let app = TestApp::spawn().await;
    let resp = app.create_tokens(Uuid::new_v4(), "1.1.1.1").await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_probes() {
    let app = TestApp::spawn().await;

    let livez = app.client.get(format!("{}/livez", app.mgmt_url)).send().await.unwrap();
    assert_eq!(livez.status(), StatusCode::OK);

    let readyz = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(readyz.status(), StatusCode::OK);
    let json: serde_json::Value = readyz.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "ok");
}

#[tokio::test]
async fn test_snake_case_request_fields_are_accepted() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/auth/tokens", app.server_url))
        .json(&json!({ "user_id": Uuid::new_v4().to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = resp.json().await.unwrap();
    let refresh_token = json["refreshToken"].as_str().unwrap();

    let resp = app
        .client
        .post(format!("{}/v1/auth/refresh", app.server_url))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
