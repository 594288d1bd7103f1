use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::Config;

pub mod jwks;
pub mod verifier;

use jwks::{HttpKeySetSource, KeySetCache};
pub use verifier::{Claims, Rejection, TokenVerifier};

/// Represents the caller identified by a verified bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    /// Returns the token subject, if the provider set one.
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }
}

/// Authentication state shared by the auth middlewares.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Creates an AuthState that fetches signing keys from the configured provider.
    pub fn from_config(config: &Config) -> Self {
        let source = Arc::new(HttpKeySetSource::new(config.jwks_url()));
        let keys = Arc::new(KeySetCache::new(source));
        let verifier = TokenVerifier::new(
            keys,
            config.issuer.clone(),
            config.client_id.clone(),
            config.clock_skew_seconds,
        );
        Self::new(Arc::new(verifier))
    }
}

/// JSON response for API errors
#[derive(serde::Serialize, Debug, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that verifies the bearer token and sets the CurrentUser extension.
/// This middleware only populates the extension; rejection is left to require_auth_middleware.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&headers) {
        match state.verifier.verify(token).await {
            Ok(claims) => {
                tracing::debug!(subject = ?claims.sub, "Verified bearer token");
                request.extensions_mut().insert(CurrentUser::new(claims));
            }
            Err(rejection) => {
                tracing::warn!(%rejection, "Token verification failed");
            }
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return unauthorized_response();
    }

    next.run(request).await
}

/// The single response every verification failure collapses to.
pub fn unauthorized_response() -> Response {
    let error_response = ErrorResponse {
        error: "Unauthorized".to_string(),
        message: "Authentication required to access this resource".to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(error_response)).into_response()
}
