//! Vault handlers: blob download/upload, security settings, recovery.

use crate::auth::{authorize, verify_secret, BasicCredentials};
use crate::error::ServerError;
use crate::server::AppState;
use crate::storage::{SecurityUpdate, StoredBlob};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, ETAG};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use spind_core::{ApiError, SecurityQuestionsResponse, SecurityRequest};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
pub struct RevisionQuery {
    pub revision: Option<String>,
}

impl RevisionQuery {
    fn parsed(&self) -> Option<u64> {
        self.revision.as_deref().and_then(|r| r.trim().parse().ok())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

fn etag(revision: u64) -> String {
    format!("\"{}\"", revision)
}

fn blob_response(blob: StoredBlob) -> Response {
    (
        StatusCode::OK,
        [
            (ETAG, etag(blob.revision)),
            (CONTENT_TYPE, "application/octet-stream".to_string()),
        ],
        blob.data,
    )
        .into_response()
}

/// GET /v1/vault
pub async fn get_vault(
    State(state): State<AppState>,
    Extension(credentials): Extension<BasicCredentials>,
    Query(query): Query<RevisionQuery>,
) -> Result<Response, ServerError> {
    authorize(&*state.storage, &credentials)?;

    let blob = state
        .storage
        .read(&credentials.name)?
        .ok_or(ApiError::VaultNotFound)?;

    if let Some(client_revision) = query.parsed() {
        if client_revision >= blob.revision {
            debug!(client_revision, server_revision = blob.revision, "Vault not modified");
            return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag(blob.revision))]).into_response());
        }
    }

    Ok(blob_response(blob))
}

/// PUT /v1/vault?revision=N
pub async fn put_vault(
    State(state): State<AppState>,
    Extension(credentials): Extension<BasicCredentials>,
    Query(query): Query<RevisionQuery>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    authorize(&*state.storage, &credentials)?;

    let revision = query.parsed().ok_or(ApiError::RevisionParameterMissing)?;
    let previous = state.storage.revision(&credentials.name)?;
    if revision <= previous {
        warn!(
            revision,
            previous, "Overwriting {} with a non-increasing revision", credentials.name
        );
    }

    state.storage.write(&credentials.name, &body, revision)?;
    info!(revision, size = body.len(), "Stored vault {}", credentials.name);
    Ok(StatusCode::OK)
}

/// PATCH /v1/vault/security
pub async fn patch_security(
    State(state): State<AppState>,
    Extension(credentials): Extension<BasicCredentials>,
    Json(request): Json<SecurityRequest>,
) -> Result<StatusCode, ServerError> {
    // Without a secret the vault is still unclaimed and any password sets it up.
    let outcome = state.storage.claim_or_update(
        &credentials.name,
        &credentials.password,
        state.config.open_registration,
        &request,
    )?;
    match outcome {
        SecurityUpdate::NotFound => return Err(ApiError::VaultNotFound.into()),
        SecurityUpdate::Rejected => return Err(ApiError::InvalidCredentials.into()),
        SecurityUpdate::Created => info!("Registered vault {}", credentials.name),
        SecurityUpdate::Updated => {}
    }
    info!(
        questions = request.security_questions.len(),
        "Updated security settings for {}", credentials.name
    );
    Ok(StatusCode::OK)
}

/// GET /v1/vault/security-questions?name=
pub async fn security_questions(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<SecurityQuestionsResponse>, ServerError> {
    let name = query.name.ok_or(ApiError::VaultNotFound)?;
    if !state.recovery_limiter.check(&name) {
        warn!("Rate limited security question lookup for {}", name);
        return Err(ApiError::TooManyRequests.into());
    }

    let security_questions = state
        .storage
        .security_questions(&name)?
        .ok_or(ApiError::VaultNotFound)?;
    if security_questions.is_empty() {
        return Err(ApiError::RecoveryNotPossible.into());
    }

    Ok(Json(SecurityQuestionsResponse { security_questions }))
}

/// GET /v1/vault/recovery
pub async fn get_recovery(
    State(state): State<AppState>,
    Extension(credentials): Extension<BasicCredentials>,
) -> Result<Response, ServerError> {
    let storage = &*state.storage;
    if !state.recovery_limiter.check(&credentials.name) {
        warn!("Rate limited recovery for {}", credentials.name);
        return Err(ApiError::TooManyRequests.into());
    }

    if !storage.exists(&credentials.name)? {
        return Err(ApiError::VaultNotFound.into());
    }
    if storage.secret(&credentials.name)?.is_none() {
        return Err(ApiError::VaultNotInitialized.into());
    }
    let backup_secret = storage
        .backup_secret(&credentials.name)?
        .ok_or(ApiError::RecoveryNotPossible)?;
    if !verify_secret(&backup_secret, &credentials.password) {
        return Err(ApiError::InvalidCredentials.into());
    }

    let blob = storage
        .read(&credentials.name)?
        .ok_or(ApiError::VaultNotFound)?;
    info!("Served recovery download for {}", credentials.name);
    Ok(blob_response(blob))
}
