use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use taskboard_server::auth::AuthState;
use taskboard_server::auth::jwks::{KeySetCache, KeySetError, KeySetSource};
use taskboard_server::auth::verifier::TokenVerifier;
use taskboard_server::notify::{Notifier, NotifyError};
use taskboard_server::task::TaskStore;
use taskboard_server::task::api::TaskState;
use taskboard_server::web::{RouterOptions, create_app};

pub const ISSUER: &str = "https://cognito-idp.ca-central-1.amazonaws.com/test-pool";
pub const CLIENT_ID: &str = "task-client";
pub const SIGNING_KEY: &str = include_str!("../fixtures/rsa_private.pem");

/// Serves the fixture key set without touching the network.
pub struct FixtureKeySet;

#[async_trait]
impl KeySetSource for FixtureKeySet {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        serde_json::from_str(include_str!("../fixtures/jwks.json"))
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))
    }
}

/// Notifier that remembers every publish and can be told to fail some.
#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<(String, String)>>,
    failing_subject: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every publish whose subject contains `needle`.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failing_subject: Some(needle.to_string()),
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if let Some(needle) = &self.failing_subject {
            if subject.contains(needle.as_str()) {
                return Err(NotifyError::Rejected(StatusCode::SERVICE_UNAVAILABLE));
            }
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn auth_state() -> Arc<AuthState> {
    let keys = Arc::new(KeySetCache::new(Arc::new(FixtureKeySet)));
    let verifier = TokenVerifier::new(keys, ISSUER, CLIENT_ID, 0);
    Arc::new(AuthState::new(Arc::new(verifier)))
}

/// Full application router over the given collaborators.
pub fn test_app(
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    reminders_require_auth: bool,
) -> Router {
    let task_state = Arc::new(TaskState::new(store, notifier));
    create_app(
        auth_state(),
        task_state,
        RouterOptions {
            reminders_require_auth,
        },
    )
}

/// Mints a token the test provider would issue, with `overrides` merged into its claims.
pub fn token_with(overrides: serde_json::Value) -> String {
    let now = jsonwebtoken::get_current_timestamp();
    let mut claims = serde_json::json!({
        "sub": "3f1c0a1e-user",
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "exp": now + 600,
        "iat": now,
        "token_use": "id",
    });
    if let (Some(claims), Some(overrides)) = (claims.as_object_mut(), overrides.as_object()) {
        for (key, value) in overrides {
            claims.insert(key.clone(), value.clone());
        }
    }

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key".to_string());
    jsonwebtoken::encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

pub fn valid_token() -> String {
    token_with(serde_json::json!({}))
}

/// JSON response snapshot for testing endpoints.
#[derive(Debug, Serialize)]
pub struct JsonResponseSnapshot {
    pub status: u16,
    pub body: serde_json::Value,
}

impl JsonResponseSnapshot {
    pub async fn from_response(response: axum::response::Response) -> Self {
        let status = response.status().as_u16();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        Self { status, body }
    }
}
