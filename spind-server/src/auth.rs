//! HTTP Basic auth middleware.
//!
//! The middleware only parses credentials. Whether they are valid depends on
//! the route (primary or backup secret, setup without a secret), so handlers
//! check them against storage.

use crate::error::ServerError;
use crate::storage::VaultStorage;
use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use spind_core::ApiError;
use subtle::ConstantTimeEq;

/// Vault name and secret from an `Authorization: Basic` header.
#[derive(Clone)]
pub struct BasicCredentials {
    pub name: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Auth middleware: rejects requests without well-formed Basic credentials.
pub async fn basic_auth_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let credentials = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic)
        .ok_or(ApiError::InvalidCredentials)?;

    request.extensions_mut().insert(credentials);
    Ok(next.run(request).await)
}

pub fn parse_basic(header: &str) -> Option<BasicCredentials> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, password) = decoded.split_once(':')?;
    if name.is_empty() {
        return None;
    }

    Some(BasicCredentials {
        name: name.to_string(),
        password: password.to_string(),
    })
}

/// Constant-time secret comparison.
pub fn verify_secret(stored: &str, provided: &str) -> bool {
    stored.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Check credentials against the primary secret.
///
/// Unknown name → 404, no secret yet → 412, mismatch → 401.
pub fn authorize(
    storage: &dyn VaultStorage,
    credentials: &BasicCredentials,
) -> Result<(), ServerError> {
    if !storage.exists(&credentials.name)? {
        return Err(ApiError::VaultNotFound.into());
    }
    let secret = storage
        .secret(&credentials.name)?
        .ok_or(ApiError::VaultNotInitialized)?;
    if !verify_secret(&secret, &credentials.password) {
        return Err(ApiError::InvalidCredentials.into());
    }
    Ok(())
}
