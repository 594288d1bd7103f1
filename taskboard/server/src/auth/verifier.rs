use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::jwks::{KeySetCache, KeySetError};

/// The only signing algorithm accepted. The `alg` header of a token is never
/// used to pick the verification algorithm.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Decoded claims of a verified token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub sub: Option<String>,
    /// Every other claim the provider issued, including `aud`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("token is malformed")]
    MalformedToken,
    #[error("token was signed with an unknown key")]
    UnknownKey,
    #[error("signing keys are unavailable")]
    KeyUnavailable,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token audience does not match")]
    AudienceMismatch,
}

impl From<jsonwebtoken::errors::Error> for Rejection {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidRsaKey(_) => Rejection::BadSignature,
            ErrorKind::ExpiredSignature => Rejection::Expired,
            ErrorKind::ImmatureSignature => Rejection::NotYetValid,
            ErrorKind::InvalidIssuer => Rejection::IssuerMismatch,
            ErrorKind::InvalidAudience => Rejection::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => Rejection::IssuerMismatch,
            ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
                Rejection::AudienceMismatch
            }
            _ => Rejection::MalformedToken,
        }
    }
}

/// Verifies bearer tokens issued by the configured identity provider.
pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    issuer: String,
    audience: String,
    leeway_seconds: u64,
}

impl TokenVerifier {
    pub fn new(
        keys: Arc<KeySetCache>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds,
        }
    }

    /// Verifies a raw token and returns its claims.
    ///
    /// Checks, in order: header shape, signing key, signature, expiry and
    /// not-before, issued-at, issuer, audience. Never panics on hostile input.
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, Rejection> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| Rejection::MalformedToken)?;
        let key_id = header.kid.ok_or(Rejection::MalformedToken)?;

        let key = self.keys.resolve(&key_id).await.map_err(|err| match err {
            KeySetError::NotFound(_) => Rejection::UnknownKey,
            KeySetError::FetchFailed(_) => Rejection::KeyUnavailable,
        })?;

        let token_data = jsonwebtoken::decode::<Claims>(token, &key, &self.validation())?;
        let claims = token_data.claims;

        if let Some(issued_at) = claims.iat {
            let now = jsonwebtoken::get_current_timestamp();
            if issued_at > now + self.leeway_seconds {
                return Err(Rejection::NotYetValid);
            }
        }

        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = self.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }
}
