mod common;

use std::sync::Arc;

use common::{TestServer, cookie_session_id, set_cookie};
use serde_json::{Value, json};
use sessionkit_core::{MemorySessionHandler, SessionHandler, SessionId};
use sessionkit_middleware::SessionConfig;
use sessionkit_redb_store::RedbSessionHandler;
use tempfile::TempDir;

async fn json_body(resp: reqwest::Response) -> Value {
    resp.json().await.expect("Response is not JSON")
}

/// POST the test payload without a cookie, returning the new session id.
async fn create_session(server: &TestServer, data: &Value) -> String {
    let resp = server.client(None).post_json("/session/set", data).await;
    assert_eq!(resp.status(), 200);

    let cookie = set_cookie(&resp).expect("New session must set a cookie");
    let session_id = cookie_session_id(&cookie);
    let body = json_body(resp).await;
    assert_eq!(body["session_id"], json!(session_id));

    session_id
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn set_get_destroy() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;
    let data = json!({"test": "testest"});

    let session_id = create_session(&server, &data).await;

    let resp = server.client(Some(&session_id)).get("/session/get").await;
    assert_eq!(set_cookie(&resp), None, "Established session resends no cookie");
    assert_eq!(json_body(resp).await["session"], data);

    let resp = server
        .client(Some(&session_id))
        .get("/session/destroy")
        .await;
    let cookie = set_cookie(&resp).expect("Destroy must clear the cookie");
    assert!(cookie.contains("Max-Age=-1;"));
    assert_eq!(json_body(resp).await["session"], json!("deleted"));
    assert!(!handler.contains(&session_id.parse::<SessionId>().unwrap()));

    let resp = server.client(Some(&session_id)).get("/session/get").await;
    assert_eq!(json_body(resp).await["session"], Value::Null);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn legacy_destroy_path() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;

    let session_id = create_session(&server, &json!(1)).await;

    let resp = server
        .client(Some(&session_id))
        .get("/session/destory")
        .await;
    assert_eq!(resp.status(), 200);
    assert!(handler.is_empty());

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn get_without_cookie_has_no_session() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;

    let resp = server.client(None).get("/session/get").await;
    assert_eq!(set_cookie(&resp), None);
    assert_eq!(json_body(resp).await["session"], Value::Null);
    assert!(handler.is_empty());

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn regenerate_deleting_old_session() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;
    let data = json!({"test": "testest"});

    let old_id = create_session(&server, &data).await;

    let resp = server
        .client(Some(&old_id))
        .post_json("/session/regenerate_session_id", &data)
        .await;
    let new_id = cookie_session_id(&set_cookie(&resp).expect("New id must be sent"));
    assert_eq!(json_body(resp).await["session_id"], json!(new_id));
    assert_ne!(new_id, old_id);
    assert!(!handler.contains(&old_id.parse::<SessionId>().unwrap()));

    // data was cleared together with the old id
    let resp = server.client(Some(&new_id)).get("/session/get").await;
    assert_eq!(json_body(resp).await["session"], Value::Null);

    let resp = server.client(Some(&old_id)).get("/session/get").await;
    assert_eq!(json_body(resp).await["session"], Value::Null);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn regenerate_keeping_data() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;
    let data = json!({"test": "testest"});

    let old_id = create_session(&server, &data).await;

    let resp = server
        .client(Some(&old_id))
        .post_json("/session/regenerate_session_id?delete_old=false", &data)
        .await;
    let new_id = cookie_session_id(&set_cookie(&resp).expect("New id must be sent"));
    assert_ne!(new_id, old_id);

    let resp = server.client(Some(&new_id)).get("/session/get").await;
    assert_eq!(json_body(resp).await["session"], data);

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn malformed_json_is_rejected() {
    let handler = Arc::new(MemorySessionHandler::new());
    let server = TestServer::start(handler.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/session/set", server.base_url()))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("POST request failed");

    assert_eq!(resp.status(), 400);
    assert_eq!(set_cookie(&resp), None);
    assert!(json_body(resp).await["message"].is_string());
    assert!(handler.is_empty());

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn persistent_cookie_attributes() {
    let handler = Arc::new(MemorySessionHandler::new());
    let config = SessionConfig::default()
        .with_session_name(common::SESSION_NAME)
        .with_cookie_expire(600)
        .with_cookie_domain("localhost");
    let server = TestServer::start_with(handler, config).await;

    let session_id = create_session(&server, &json!("x")).await;

    let resp = server.client(Some(&session_id)).get("/session/get").await;
    assert_eq!(
        set_cookie(&resp),
        Some(format!(
            "{}={session_id}; path=/;Max-Age=600;SameSite=Lax;Domain=localhost;HttpOnly;",
            common::SESSION_NAME
        ))
    );

    server.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn redb_backed_flow() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let handler: Arc<dyn SessionHandler> = Arc::new(
        RedbSessionHandler::open(dir.path().join("sessions.redb"))
            .await
            .expect("Failed to open database"),
    );
    let server = TestServer::start(handler).await;
    let data = json!({"nested": {"list": [1, 2, 3], "flag": true}});

    let session_id = create_session(&server, &data).await;

    let resp = server.client(Some(&session_id)).get("/session/get").await;
    assert_eq!(json_body(resp).await["session"], data);

    server.shutdown().await;
}
