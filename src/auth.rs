use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::Arc;
use thiserror::Error;

use crate::error::AppError;
use crate::models::{Claims, Identity};
use crate::storage::StorageError;

/// Lifetime of an issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Issues and verifies HS256 bearer tokens with a server-held secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Issue("signing secret is empty".to_string()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        self.issue_at(email, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(&self, email: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            email: email.to_owned(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }
}

/// The token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication gate for protected routes.
///
/// A missing or garbled header is `Unauthenticated`; a token that fails
/// verification is `Forbidden`. Either way the wrapped handler never runs.
/// On success the verified [`Claims`] are placed in the request extensions.
pub async fn require_auth(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        tracing::debug!(path = %req.uri().path(), "request without bearer token");
        AppError::Unauthenticated
    })?;
    let claims = tokens.verify(token).map_err(|e| {
        tracing::warn!(error = %e, path = %req.uri().path(), "rejected bearer token");
        AppError::Forbidden
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Read access to stored identities, as needed by the role checks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn identity(&self, email: &str) -> Result<Option<Identity>, StorageError>;
}

/// Role escalation gate: the caller named by the verified token must hold the
/// admin role. A caller with no stored identity is treated as unprivileged.
pub async fn require_admin<S>(store: &S, claims: &Claims) -> Result<Identity, AppError>
where
    S: CredentialStore + ?Sized,
{
    match store.identity(&claims.email).await? {
        Some(identity) if identity.is_admin() => Ok(identity),
        _ => {
            tracing::warn!(requester = %claims.email, "admin role required");
            Err(AppError::Forbidden)
        }
    }
}

/// Whether `email` holds the admin role; `NotFound` when no such identity.
pub async fn is_admin<S>(store: &S, email: &str) -> Result<bool, AppError>
where
    S: CredentialStore + ?Sized,
{
    store
        .identity(email)
        .await?
        .map(|identity| identity.is_admin())
        .ok_or_else(|| AppError::NotFound(format!("no user with email {email}")))
}
