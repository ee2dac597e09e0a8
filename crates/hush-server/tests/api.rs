use axum::http::{Method, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use hush_server::{
    router,
    store::{KdfParams, Store},
    AppState, Policy, Secrets,
};

const API_KEY: &str = "test-admin-key";

fn cheap_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

fn server_with(api_key: Option<&str>, max_secret_bytes: usize) -> (tempfile::TempDir, TestServer) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("hush.db")).unwrap();
    let state = AppState {
        secrets: Secrets::new(
            store,
            Policy {
                max_secret_bytes,
                kdf: cheap_kdf(),
            },
        ),
        api_key: api_key.map(str::to_owned),
    };
    let server = TestServer::new(router(state, None)).unwrap();
    (dir, server)
}

fn server() -> (tempfile::TempDir, TestServer) {
    server_with(Some(API_KEY), 50 * 1024)
}

async fn share(server: &TestServer, data: &str, passphrase: &str) -> String {
    let resp = server
        .post("/secrets")
        .json(&json!({"data": data, "passphrase": passphrase}))
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json::<Value>()["token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, server) = server();
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn share_then_reveal_once() {
    let (_dir, server) = server();

    let resp = server
        .post("/secrets")
        .json(&json!({"data": "hello", "passphrase": "x"}))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body = resp.json::<Value>();
    let token = body["token"].as_str().unwrap().to_owned();
    assert_eq!(token.len(), 22);
    assert_eq!(
        body["expire_at"].as_i64().unwrap() - body["created_at"].as_i64().unwrap(),
        600
    );

    let resp = server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "x"}))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.header("cache-control"), "no-store");
    assert_eq!(resp.json::<Value>()["data"], "hello");

    let resp = server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "x"}))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_passphrase_is_forbidden_and_keeps_secret() {
    let (_dir, server) = server();
    let token = share(&server, "keep me", "right").await;

    let resp = server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "wrong"}))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    assert!(resp.json::<Value>().get("data").is_none());

    let resp = server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "right"}))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["data"], "keep me");
}

#[tokio::test]
async fn unicode_roundtrip() {
    let (_dir, server) = server();
    let data = "Hello 世界 🔐\nПривет";
    let token = share(&server, data, "p").await;
    let resp = server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "p"}))
        .await;
    assert_eq!(resp.json::<Value>()["data"], data);
}

#[tokio::test]
async fn malformed_token_is_not_found() {
    let (_dir, server) = server();
    for token in ["short", "AAAAAAAAAAAAAAAAAAAAAA", "abcdefghij.lmnopqrstuv"] {
        let resp = server
            .post(&format!("/secrets/{token}/reveal"))
            .json(&json!({"passphrase": "p"}))
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let (_dir, server) = server_with(Some(API_KEY), 16);

    let resp = server
        .post("/secrets")
        .json(&json!({"data": "", "passphrase": "p"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server
        .post("/secrets")
        .json(&json!({"data": "data", "passphrase": ""}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server
        .post("/secrets")
        .json(&json!({"data": "a".repeat(16), "passphrase": "p"}))
        .await;
    resp.assert_status(StatusCode::CREATED);

    let resp = server
        .post("/secrets")
        .json(&json!({"data": "a".repeat(17), "passphrase": "p"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let error = resp.json::<Value>()["error"].as_str().unwrap().to_owned();
    assert!(error.contains("maximum"), "{error}");
}

#[tokio::test]
async fn head_reports_availability() {
    let (_dir, server) = server();
    let token = share(&server, "data", "p").await;

    let resp = server
        .method(Method::HEAD, &format!("/secrets/{token}"))
        .await;
    resp.assert_status_ok();
    let expires: i64 = resp
        .header("x-hush-expires-at")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(expires > 0);

    server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "p"}))
        .await
        .assert_status_ok();

    server
        .method(Method::HEAD, &format!("/secrets/{token}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_requires_api_key() {
    let (_dir, server) = server();
    server
        .get("/secrets")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/secrets")
        .authorization_bearer("not-the-key")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/secrets")
        .authorization_bearer(API_KEY)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn admin_disabled_without_api_key() {
    let (_dir, server) = server_with(None, 50 * 1024);
    server
        .get("/secrets")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .post("/prune")
        .authorization_bearer("anything")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    // Sharing stays public.
    share(&server, "data", "p").await;
}

#[tokio::test]
async fn admin_lists_newest_first_without_ciphertext() {
    let (_dir, server) = server();
    let first = share(&server, "one", "p").await;
    let second = share(&server, "two", "p").await;

    let resp = server.get("/secrets").authorization_bearer(API_KEY).await;
    resp.assert_status_ok();
    let body = resp.json::<Value>();
    let secrets = body["secrets"].as_array().unwrap();
    assert_eq!(secrets.len(), 2);

    let tokens: Vec<_> = secrets
        .iter()
        .map(|s| s["token"].as_str().unwrap().to_owned())
        .collect();
    assert!(tokens.contains(&first) && tokens.contains(&second));
    let created: Vec<_> = secrets
        .iter()
        .map(|s| s["created_at"].as_i64().unwrap())
        .collect();
    assert!(created[0] >= created[1]);

    for s in secrets {
        assert!(s.get("ciphertext").is_none());
        assert!(s.get("salt").is_none());
        assert!(s["size"].as_u64().unwrap() > 0);
        assert_eq!(s["available"], true);
    }
}

#[tokio::test]
async fn admin_delete_and_prune() {
    let (_dir, server) = server();
    let token = share(&server, "data", "p").await;

    let resp = server
        .delete(&format!("/secrets/{token}"))
        .authorization_bearer(API_KEY)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["deleted"], true);

    server
        .delete(&format!("/secrets/{token}"))
        .authorization_bearer(API_KEY)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post(&format!("/secrets/{token}/reveal"))
        .json(&json!({"passphrase": "p"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let resp = server.post("/prune").authorization_bearer(API_KEY).await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["pruned"], 0);
}
