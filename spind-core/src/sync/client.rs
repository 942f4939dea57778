//! HTTP sync client for communicating with a spind server.

use crate::api::{ApiError, ErrorResponse, SecurityQuestionsResponse, SecurityRequest};
use crate::model::Vault;
use crate::storage::ClientStorage;
use crate::sync::config::ClientConfig;
use crate::{Result, SpindError};
use reqwest::header::{HeaderMap, CONTENT_TYPE, ETAG};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

const VAULT_PATH: &str = "/v1/vault";
const RECOVERY_PATH: &str = "/v1/vault/recovery";
const SECURITY_PATH: &str = "/v1/vault/security";
const SECURITY_QUESTIONS_PATH: &str = "/v1/vault/security-questions";

/// HTTP client for a spind server, backed by a local blob cache.
pub struct SyncClient<S: ClientStorage> {
    client: reqwest::Client,
    storage: S,
}

impl<S: ClientStorage> SyncClient<S> {
    /// Create a new sync client with default settings.
    pub fn new(storage: S) -> Result<Self> {
        Self::with_config(storage, &ClientConfig::default())
    }

    pub fn with_config(storage: S, config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SpindError::Io(std::io::Error::other(e.to_string())))?;

        Ok(Self { client, storage })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetch the container bytes for a vault.
    ///
    /// Sends the cached revision so the server can answer 304. A transport
    /// failure falls back to the cached bytes when there are any.
    pub async fn fetch(&self, vault: &Vault, secret: &str) -> Result<Vec<u8>> {
        let local_revision = self.storage.cached_revision(vault)?;

        let mut request = self
            .client
            .get(url(vault, VAULT_PATH))
            .basic_auth(&vault.username, Some(secret));
        if let Some(revision) = local_revision {
            request = request.query(&[("revision", revision)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Server unreachable for {}: {}", vault.username, e);
                return self.cached_or(vault, ApiError::NetworkError);
            }
        };

        match response.status() {
            StatusCode::OK => {
                let revision = etag_revision(response.headers());
                let data = match response.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        warn!("Vault download interrupted for {}: {}", vault.username, e);
                        return self.cached_or(vault, ApiError::NetworkError);
                    }
                };
                debug!(revision, ?local_revision, "Server sent newer vault");
                if let Err(e) = self.storage.cache_vault(vault, &data, revision) {
                    warn!("Failed to cache vault for {}: {}", vault.username, e);
                }
                Ok(data)
            }
            StatusCode::NOT_MODIFIED => {
                debug!(?local_revision, "Cached vault is current");
                self.cached_or(vault, ApiError::VaultNotInitialized)
            }
            StatusCode::PRECONDITION_FAILED => Err(ApiError::VaultNotInitialized.into()),
            _ => Err(error_from_response(response).await.into()),
        }
    }

    /// Upload container bytes as the next revision. Returns the new revision.
    ///
    /// No cache fallback: a write that did not reach the server is an error.
    pub async fn upload(&self, vault: &Vault, secret: &str, data: &[u8]) -> Result<u64> {
        let revision = self.storage.cached_revision(vault)?.unwrap_or(0) + 1;

        let request = self
            .client
            .put(url(vault, VAULT_PATH))
            .basic_auth(&vault.username, Some(secret))
            .query(&[("revision", revision)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec());

        let response = send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        info!(revision, "Uploaded vault for {}", vault.username);
        if let Err(e) = self.storage.cache_vault(vault, data, revision) {
            warn!("Failed to cache vault for {}: {}", vault.username, e);
        }
        Ok(revision)
    }

    /// Fetch the full container with the backup secret. Never cached.
    pub async fn fetch_recovery(&self, vault: &Vault, backup_secret: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(url(vault, RECOVERY_PATH))
            .basic_auth(&vault.username, Some(backup_secret));

        let response = send(request).await?;
        match response.status() {
            status if status.is_success() => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|_| ApiError::NetworkError.into()),
            StatusCode::PRECONDITION_FAILED => Err(ApiError::VaultNotInitialized.into()),
            _ => Err(error_from_response(response).await.into()),
        }
    }

    /// Security question texts for a vault. Unauthenticated.
    pub async fn security_questions(&self, vault: &Vault) -> Result<Vec<String>> {
        let request = self
            .client
            .get(url(vault, SECURITY_QUESTIONS_PATH))
            .query(&[("name", vault.username.as_str())]);

        let response = send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }

        let body: SecurityQuestionsResponse = response
            .json()
            .await
            .map_err(|_| ApiError::UnknownError)?;
        if body.security_questions.is_empty() {
            return Err(ApiError::RecoveryNotPossible.into());
        }
        Ok(body.security_questions)
    }

    /// Replace the secret, questions and backup secret, authenticated with the old secret.
    pub async fn update_security(
        &self,
        vault: &Vault,
        old_secret: &str,
        request: &SecurityRequest,
    ) -> Result<()> {
        let request = self
            .client
            .patch(url(vault, SECURITY_PATH))
            .basic_auth(&vault.username, Some(old_secret))
            .json(request);

        let response = send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }
        info!("Updated security settings for {}", vault.username);
        Ok(())
    }

    fn cached_or(&self, vault: &Vault, error: ApiError) -> Result<Vec<u8>> {
        match self.storage.cached_vault(vault)? {
            Some(data) => {
                info!("Using cached vault for {}", vault.username);
                Ok(data)
            }
            None => Err(error.into()),
        }
    }
}

fn url(vault: &Vault, path: &str) -> String {
    format!("{}{}", vault.address.trim_end_matches('/'), path)
}

async fn send(request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(|e| {
        warn!("Server unreachable: {}", e);
        ApiError::NetworkError.into()
    })
}

/// Error code from a `{"error": CODE}` body, or a guess from the status.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorResponse>(&body)
            .map(|r| r.error)
            .unwrap_or_else(|_| ApiError::from_http_status(status)),
        Err(_) => ApiError::from_http_status(status),
    }
}

/// Revision carried in the `ETag` header. Missing or unparseable means 0.
fn etag_revision(headers: &HeaderMap) -> u64 {
    headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_etag)
        .unwrap_or(0)
}

fn parse_etag(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"').parse().ok()
}
