//! `HttpVaultClient` against a mock vault server.

use std::time::Duration;

use otpvault_core::account::{AccountSpec, Algorithm, Session};
use otpvault_core::api::{HttpVaultClient, VaultApi, VaultErrorKind};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpVaultClient {
    HttpVaultClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

fn session() -> Session {
    Session::new("hunter2")
}

#[tokio::test]
async fn test_status_reports_vault_presence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vault_exists": true})))
        .expect(1)
        .mount(&server)
        .await;

    let status = client(&server).status().await.unwrap();
    assert!(status.vault_exists);
}

#[tokio::test]
async fn test_init_sends_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/init"))
        .and(body_json(json!({"password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).init(&session()).await.unwrap();
}

#[tokio::test]
async fn test_unlock_drops_secret_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/unlock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "accounts": [
                {"id": "a1", "issuer": "GitHub", "label": "octocat", "secret": "JBSWY3DP",
                 "digits": 6, "period": 30, "algorithm": "SHA1"},
                {"id": "a2", "issuer": null, "label": null}
            ]
        })))
        .mount(&server)
        .await;

    let accounts = client(&server).unlock(&session()).await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].id, "a1");
    assert_eq!(accounts[0].issuer.as_deref(), Some("GitHub"));
    assert_eq!(accounts[1].label, "Account");
}

#[tokio::test]
async fn test_wrong_password_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/unlock"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"ok": false, "error": "wrong password"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).unlock(&session()).await.unwrap_err();
    assert_eq!(err.kind, VaultErrorKind::Server);
    assert_eq!(err.to_string(), "wrong password");
}

#[tokio::test]
async fn test_add_sends_account_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/add"))
        .and(body_json(json!({
            "password": "hunter2",
            "account": {
                "issuer": "Acme",
                "label": null,
                "secret": "JBSWY3DP",
                "digits": 8,
                "period": 60,
                "algorithm": "SHA256"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "account": {"id": "new", "issuer": "Acme", "label": "Account", "secret": "JBSWY3DP"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spec = AccountSpec {
        digits: 8,
        period: 60,
        algorithm: Algorithm::Sha256,
        ..AccountSpec::new("jbsw y3dp").with_issuer("Acme")
    }
    .normalized();

    let account = client(&server)
        .add_account(&session(), &spec)
        .await
        .unwrap();
    assert_eq!(account.id, "new");
    assert_eq!(account.label, "Account");
}

#[tokio::test]
async fn test_remove_returns_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/remove"))
        .and(body_json(json!({"password": "hunter2", "id": "a1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "removed": 1})))
        .mount(&server)
        .await;

    let removed = client(&server)
        .remove_account(&session(), "a1")
        .await
        .unwrap();
    assert_eq!(removed, 1);
}

#[tokio::test]
async fn test_code_with_remaining() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/code"))
        .and(body_json(json!({"password": "hunter2", "id": "a1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true, "code": "492039", "remaining": 17
        })))
        .mount(&server)
        .await;

    let reading = client(&server).get_code(&session(), "a1").await.unwrap();
    assert_eq!(reading.code, "492039");
    assert_eq!(reading.remaining, Some(17));
}

#[tokio::test]
async fn test_code_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/code"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"ok": false, "error": "not found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).get_code(&session(), "gone").await.unwrap_err();
    assert_eq!(err.message, "not found");
}

#[tokio::test]
async fn test_html_error_page_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/code"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<h1>Bad Gateway</h1>"))
        .mount(&server)
        .await;

    let err = client(&server).get_code(&session(), "a1").await.unwrap_err();
    assert_eq!(err.kind, VaultErrorKind::HttpStatus);
    assert_eq!(err.details.as_deref(), Some("<h1>Bad Gateway</h1>"));
}

#[tokio::test]
async fn test_unreachable_server_is_request_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = HttpVaultClient::new(&uri, Duration::from_secs(2)).unwrap();
    let err = client.status().await.unwrap_err();
    assert_eq!(err.kind, VaultErrorKind::Request);
}
