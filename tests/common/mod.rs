#![allow(dead_code)]

use std::sync::Arc;

use automation_portal::{
    config::{Config, RoleSource},
    credentials::MemoryCredentialStore,
    crypto::aes::{SessionKey, seal_token},
    services::session::SessionController,
    state::AppState,
};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: [u8; 32] = [42u8; 32];
pub const CREDENTIAL: &str = "abc123";

pub fn key_base64() -> String {
    general_purpose::STANDARD.encode(TEST_KEY)
}

pub fn seal(credential: &str) -> String {
    let key = SessionKey::from_bytes(&TEST_KEY).unwrap();
    seal_token(&key, credential).unwrap()
}

pub fn seal_with(key_bytes: &[u8], credential: &str) -> String {
    let key = SessionKey::from_bytes(key_bytes).unwrap();
    seal_token(&key, credential).unwrap()
}

pub fn config_for(server: &MockServer, role_source: RoleSource) -> Config {
    Config::new(&server.uri(), &key_base64())
        .unwrap()
        .with_role_source(role_source)
}

pub fn claims_source() -> RoleSource {
    RoleSource::Claims {
        admin_groups: vec!["platform-admins".to_string()],
    }
}

pub fn controller_with(config: &Config) -> (Arc<SessionController>, Arc<MemoryCredentialStore>) {
    let state = AppState::new(config).unwrap();
    let store = Arc::new(MemoryCredentialStore::new());
    let controller = Arc::new(SessionController::new(state, store.clone()));
    (controller, store)
}

pub fn controller_for(
    server: &MockServer,
    role_source: RoleSource,
) -> (Arc<SessionController>, Arc<MemoryCredentialStore>) {
    controller_with(&config_for(server, role_source))
}

pub fn alice(groups: &[&str]) -> Value {
    json!({
        "user": {
            "name": "Alice",
            "email": "a@x.com",
            "groups": groups
        }
    })
}

/// Serves `body` on `GET /user` for requests bearing the test credential.
pub async fn mount_session(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", format!("Bearer {}", CREDENTIAL).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
