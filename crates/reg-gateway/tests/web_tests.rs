//! Integration tests for the web registration API.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use identity_store::{IdentityStore, TokenStore};
use reg_gateway::web::{create_router, WebState};
use registration_core::{
    ChannelError, Choice, LocaleCatalog, MessageRef, Messenger, RegistrationPolicy, Registrar,
    WebRegistration,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use voice_directory::{AccountDirectory, DirectoryError, NewAccount};

/// Directory stub: every username is available unless listed.
struct StubDirectory {
    taken: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

#[async_trait]
impl AccountDirectory for StubDirectory {
    async fn exists(&self, username: &str) -> Result<bool, DirectoryError> {
        if *self.fail.lock().unwrap() {
            return Err(DirectoryError::Unavailable("daemon offline".into()));
        }
        Ok(self.taken.lock().unwrap().iter().any(|u| u == username))
    }

    async fn create(&self, account: &NewAccount) -> Result<(), DirectoryError> {
        self.taken.lock().unwrap().push(account.username.clone());
        Ok(())
    }

    async fn remove(&self, _username: &str) -> Result<bool, DirectoryError> {
        Ok(true)
    }

    async fn broadcast(&self, _message: &str) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.taken.lock().unwrap().clone())
    }
}

/// Messenger that swallows everything (no admins configured in tests).
struct NullMessenger;

#[async_trait]
impl Messenger for NullMessenger {
    async fn send_text(&self, _: &str, _: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send_document(
        &self,
        _: &str,
        _: Vec<u8>,
        _: &str,
        _: &str,
    ) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn prompt_choices(
        &self,
        recipient: &str,
        _: &str,
        _: &[Choice],
    ) -> Result<MessageRef, ChannelError> {
        Ok(MessageRef {
            chat_id: recipient.to_string(),
            message_id: 0,
        })
    }

    async fn retire_prompt(&self, _: &MessageRef) -> Result<(), ChannelError> {
        Ok(())
    }
}

struct TestApp {
    _tmp: tempfile::TempDir,
    state: WebState,
    directory: Arc<StubDirectory>,
}

fn test_app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let store = IdentityStore::memory();
    let tokens = TokenStore::memory();
    let directory = Arc::new(StubDirectory {
        taken: Mutex::new(Vec::new()),
        fail: Mutex::new(false),
    });
    let locales = Arc::new(LocaleCatalog::new());
    let policy = RegistrationPolicy::default();

    let generator = Arc::new(artifact_gen::ArtifactGenerator::new(
        artifact_gen::ServerProfile {
            server_name: "Voice Server".into(),
            host: "voice.example.org".into(),
            public_host: None,
            tcp_port: 10333,
            udp_port: 10333,
            encrypted: false,
        },
        tmp.path().join("files"),
        tmp.path().join("bundles"),
        tokens,
        Duration::from_secs(600),
    ));
    let registrar = Arc::new(Registrar::new(
        store.clone(),
        directory.clone(),
        generator.clone(),
        Arc::new(NullMessenger),
        locales,
        policy,
    ));
    let service = Arc::new(WebRegistration::new(
        store,
        directory.clone(),
        registrar,
    ));

    TestApp {
        _tmp: tmp,
        state: WebState {
            service,
            artifacts: generator,
            server_name: "Voice Server".into(),
            locale: "en".into(),
        },
        directory,
    }
}

fn register_request(ip: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["bundles_enabled"], false);
}

#[tokio::test]
async fn test_register_page_serves_form() {
    let app = test_app();
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/register")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains("Voice Server"));
}

#[tokio::test]
async fn test_register_and_download_once() {
    let app = test_app();
    let router = create_router(app.state.clone());

    let response = router
        .clone()
        .oneshot(register_request(
            "203.0.113.7",
            "username=alice&password=secret",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["username"], "alice");
    assert!(json["quick_connect"]
        .as_str()
        .unwrap()
        .starts_with("tt://voice.example.org?"));
    assert!(json.get("bundle_download").is_none());

    let url = json["config_download"]["url"].as_str().unwrap().to_string();
    assert_eq!(json["config_download"]["filename"], "Voice Server.tt");

    // First download succeeds with the advertised filename.
    let response = router
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("Voice Server.tt"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(body.to_vec())
        .unwrap()
        .contains("<username>alice</username>"));

    // Redemption is single-shot.
    let response = router
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_rejects_second_ip_attempt() {
    let app = test_app();
    let router = create_router(app.state.clone());

    let response = router
        .clone()
        .oneshot(register_request(
            "203.0.113.7",
            "username=alice&password=secret",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(register_request(
            "203.0.113.7",
            "username=bob&password=hunter2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(response).await;
    assert_eq!(json["code"], "IP_ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_register_conflicts_on_taken_username() {
    let app = test_app();
    app.directory.taken.lock().unwrap().push("alice".into());
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(register_request(
            "203.0.113.8",
            "username=alice&password=secret",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["code"], "USERNAME_TAKEN");
}

#[tokio::test]
async fn test_register_maps_directory_outage() {
    let app = test_app();
    *app.directory.fail.lock().unwrap() = true;
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(register_request(
            "203.0.113.9",
            "username=alice&password=secret",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = test_app();
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/download/config/doesnotexist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}
