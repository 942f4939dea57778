//! One vault's unlock lifecycle against a server.
//!
//! A [`Session`] holds at most one unlocked vault. Credential changes follow a
//! fixed order: the server is told the new secret first (authenticated with
//! the old one), then the vault is uploaded re-encrypted under the new key,
//! and only then does the session switch over.
//!
//! The re-encrypted container is saved to client storage before the server
//! is told anything. If the upload never lands, the server expects the new
//! secret while still holding a blob encrypted under the old key. The saved
//! copy bridges that gap: the next [`Session::unlock`] with the new password
//! uploads it and clears it.

use crate::api::{ApiError, SecurityRequest};
use crate::crypto::{BackupCredentials, PasswordCredentials};
use crate::model::{SecurityQuestion, UnlockedVault, Vault};
use crate::storage::ClientStorage;
use crate::sync::client::SyncClient;
use crate::unlock::{self, UnlockState};
use crate::{Result, SpindError};
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Client-side session: the sync client plus the currently unlocked vault.
pub struct Session<S: ClientStorage> {
    client: SyncClient<S>,
    state: UnlockState,
    vault: Option<Vault>,
    unlocked: Option<UnlockedVault>,
    pending_rotation: Option<UnlockedVault>,
}

impl<S: ClientStorage> Session<S> {
    pub fn new(client: SyncClient<S>) -> Self {
        Self {
            client,
            state: UnlockState::Locked,
            vault: None,
            unlocked: None,
            pending_rotation: None,
        }
    }

    pub fn client(&self) -> &SyncClient<S> {
        &self.client
    }

    pub fn state(&self) -> UnlockState {
        self.state
    }

    /// Pointer of the vault this session is bound to.
    pub fn vault(&self) -> Option<&Vault> {
        self.vault.as_ref()
    }

    pub fn unlocked(&self) -> Option<&UnlockedVault> {
        self.unlocked.as_ref()
    }

    pub fn unlocked_mut(&mut self) -> Option<&mut UnlockedVault> {
        self.unlocked.as_mut()
    }

    /// Rotated vault whose upload failed, waiting for [`Session::retry_rotation`].
    pub fn pending_rotation(&self) -> Option<&UnlockedVault> {
        self.pending_rotation.as_ref()
    }

    /// Fetch a vault and unlock it with the master password.
    pub async fn unlock(&mut self, vault: &Vault, password: &str) -> Result<&UnlockedVault> {
        self.lock();
        self.state = UnlockState::Unlocking;

        let credentials = PasswordCredentials::derive(password);
        let result = match self.resume_rotation(vault, &credentials).await {
            Ok(Some(unlocked)) => Ok(unlocked),
            Ok(None) => match self.client.fetch(vault, credentials.secret()).await {
                Ok(data) => unlock::unlock_with_password(vault, &data, &credentials),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.finish_unlock(vault, result)
    }

    /// Fetch a vault through the recovery endpoint and unlock it with the answers.
    pub async fn recover<A: AsRef<str>>(
        &mut self,
        vault: &Vault,
        answers: &[A],
    ) -> Result<&UnlockedVault> {
        self.lock();
        self.state = UnlockState::Unlocking;

        let backup = BackupCredentials::derive(answers);
        let result = match self.client.fetch_recovery(vault, backup.secret()).await {
            Ok(data) => unlock::unlock_with_answers(vault, &data, &backup),
            Err(e) => Err(e),
        };

        // The recovery download is not cached, so a regular fetch with the
        // recovered secret brings the cached revision up to the server's.
        if let Ok(unlocked) = &result {
            if let Err(e) = self.client.fetch(vault, unlocked.secret()).await {
                warn!("Could not refresh cached revision after recovery: {}", e);
            }
        }
        self.finish_unlock(vault, result)
    }

    /// Initialize a vault that has no secret yet and upload an empty tree.
    pub async fn setup(
        &mut self,
        vault: &Vault,
        password: &str,
        security_questions: Vec<SecurityQuestion>,
    ) -> Result<&UnlockedVault> {
        self.lock();

        let credentials = PasswordCredentials::derive(password);
        let fresh = UnlockedVault::new_empty(vault, &credentials, security_questions);
        self.vault = Some(vault.clone());

        if let Err(e) = self.rotate("", fresh).await {
            if !matches!(e, SpindError::PartialRotation { .. }) {
                self.vault = None;
            }
            return Err(e);
        }
        info!("Set up vault {} for {}", vault.name, vault.username);
        self.unlocked.as_ref().ok_or(SpindError::VaultLocked)
    }

    /// Encrypt the unlocked vault and upload it as the next revision.
    pub async fn save(&mut self) -> Result<u64> {
        let vault = self.vault.as_ref().ok_or(SpindError::VaultLocked)?;
        let unlocked = self.unlocked.as_ref().ok_or(SpindError::VaultLocked)?;

        let data = unlock::encode_vault(unlocked)?;
        self.client.upload(vault, unlocked.secret(), &data).await
    }

    /// Switch to a new master password, keeping entries and questions.
    pub async fn change_password(&mut self, new_password: &str) -> Result<()> {
        let current = self.unlocked.as_ref().ok_or(SpindError::VaultLocked)?;
        let old_secret = Zeroizing::new(current.secret().to_string());
        let rotated = current.with_credentials(&PasswordCredentials::derive(new_password));

        self.rotate(&old_secret, rotated).await
    }

    /// Replace the security questions and answers.
    pub async fn update_security(&mut self, security_questions: Vec<SecurityQuestion>) -> Result<()> {
        let current = self.unlocked.as_ref().ok_or(SpindError::VaultLocked)?;
        let old_secret = Zeroizing::new(current.secret().to_string());
        let mut rotated = current.clone();
        rotated.security_questions = security_questions;

        self.rotate(&old_secret, rotated).await
    }

    /// Upload a rotated vault again after [`SpindError::PartialRotation`].
    ///
    /// Returns `false` when nothing is pending.
    pub async fn retry_rotation(&mut self) -> Result<bool> {
        let Some(rotated) = self.pending_rotation.take() else {
            return Ok(false);
        };
        let data = unlock::encode_vault(&rotated)?;
        self.finish_rotation(rotated, data).await?;
        Ok(true)
    }

    /// Forget the unlocked vault. Secrets are wiped as it drops.
    ///
    /// An unfinished rotation stays in client storage and completes on the
    /// next unlock with the new password.
    pub fn lock(&mut self) {
        if let (Some(_), Some(vault)) = (&self.pending_rotation, &self.vault) {
            warn!(
                "Locking {} with an unfinished credential rotation; unlock with the new password to complete it",
                vault.name
            );
        }
        if self.unlocked.is_some() {
            info!("Vault locked");
        }
        self.unlocked = None;
        self.pending_rotation = None;
        self.vault = None;
        self.state = UnlockState::Locked;
    }

    fn finish_unlock(&mut self, vault: &Vault, result: Result<UnlockedVault>) -> Result<&UnlockedVault> {
        match result {
            Ok(unlocked) => {
                info!("Vault {} unlocked for {}", vault.name, vault.username);
                self.state = UnlockState::Unlocked;
                self.vault = Some(vault.clone());
                Ok(self.unlocked.insert(unlocked))
            }
            Err(e) => {
                warn!("Unlock of {} failed: {}", vault.name, e);
                self.state = UnlockState::Failed(e.api_error());
                Err(e)
            }
        }
    }

    async fn rotate(&mut self, old_secret: &str, rotated: UnlockedVault) -> Result<()> {
        let vault = self.vault.clone().ok_or(SpindError::VaultLocked)?;
        // Encode first so nothing local can fail once the server has switched.
        let data = unlock::encode_vault(&rotated)?;
        self.client
            .storage()
            .set_pending_rotation(&vault, Some(data.as_slice()))?;

        if let Err(e) = self
            .client
            .update_security(&vault, old_secret, &security_request(&rotated))
            .await
        {
            // After a transport failure the server may or may not have switched.
            if e.api_error() != ApiError::NetworkError {
                self.clear_pending(&vault);
            }
            return Err(e);
        }
        self.finish_rotation(rotated, data).await
    }

    async fn finish_rotation(&mut self, rotated: UnlockedVault, data: Vec<u8>) -> Result<()> {
        let vault = self.vault.clone().ok_or(SpindError::VaultLocked)?;

        match self.client.upload(&vault, rotated.secret(), &data).await {
            Ok(_) => {
                self.clear_pending(&vault);
                self.pending_rotation = None;
                self.unlocked = Some(rotated);
                self.state = UnlockState::Unlocked;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Credentials for {} rotated but upload failed: {}",
                    vault.username, e
                );
                self.pending_rotation = Some(rotated.clone());
                Err(SpindError::PartialRotation {
                    vault: Box::new(rotated),
                    source: e.api_error(),
                })
            }
        }
    }

    /// Upload a saved rotation if `credentials` open it.
    ///
    /// `Ok(None)` means there is nothing to finish for these credentials and
    /// the regular fetch should run.
    async fn resume_rotation(
        &self,
        vault: &Vault,
        credentials: &PasswordCredentials,
    ) -> Result<Option<UnlockedVault>> {
        let Some(data) = self.client.storage().pending_rotation(vault)? else {
            return Ok(None);
        };
        let Ok(unlocked) = unlock::unlock_with_password(vault, &data, credentials) else {
            return Ok(None);
        };

        match self.client.upload(vault, credentials.secret(), &data).await {
            Ok(revision) => {
                info!(revision, "Finished pending credential rotation for {}", vault.username);
                self.clear_pending(vault);
                Ok(Some(unlocked))
            }
            Err(SpindError::Api(ApiError::InvalidCredentials)) => {
                warn!(
                    "Server never accepted the rotated credentials for {}; dropping the saved copy",
                    vault.username
                );
                self.clear_pending(vault);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn clear_pending(&self, vault: &Vault) {
        if let Err(e) = self.client.storage().set_pending_rotation(vault, None) {
            warn!("Could not clear pending rotation for {}: {}", vault.username, e);
        }
    }
}

/// The PATCH body that installs a vault's current credentials on the server.
pub fn security_request(vault: &UnlockedVault) -> SecurityRequest {
    let security_questions = vault
        .security_questions
        .iter()
        .map(|q| q.question.clone())
        .collect::<Vec<_>>();
    let backup_secret = if security_questions.is_empty() {
        None
    } else {
        Some(BackupCredentials::derive(&vault.answers()).secret().to_string())
    };

    SecurityRequest {
        secret: vault.secret().to_string(),
        security_questions,
        backup_secret,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn offline_session() -> (Session<MemoryStorage>, Vault) {
        let vault = Vault::new("Home", "http://127.0.0.1:1", "alice");
        let client = SyncClient::new(MemoryStorage::new()).unwrap();
        (Session::new(client), vault)
    }

    fn sample(vault: &Vault, password: &str) -> UnlockedVault {
        let mut unlocked = UnlockedVault::new_empty(
            vault,
            &PasswordCredentials::derive(password),
            vec![SecurityQuestion::new("Pet?", "Rex")],
        );
        unlocked
            .passwords
            .push(crate::model::Password::new("mail").with_field("password", "pw"));
        unlocked
    }

    #[test]
    fn test_security_request_contents() {
        let vault = Vault::new("Home", "http://h", "alice");
        let unlocked = sample(&vault, "pw");
        let request = security_request(&unlocked);

        assert_eq!(request.secret, unlocked.secret());
        assert_eq!(request.security_questions, ["Pet?"]);
        assert_eq!(
            request.backup_secret.as_deref(),
            Some(BackupCredentials::derive(&["Rex"]).secret())
        );

        let bare = UnlockedVault::new_empty(&vault, &PasswordCredentials::derive("pw"), Vec::new());
        assert!(security_request(&bare).backup_secret.is_none());
    }

    #[tokio::test]
    async fn test_offline_unlock_from_cache() {
        let (mut session, vault) = offline_session();
        let stored = sample(&vault, "correct horse");
        let bytes = unlock::encode_vault(&stored).unwrap();
        session.client().storage().cache_vault(&vault, &bytes, 4).unwrap();

        let unlocked = session.unlock(&vault, "correct horse").await.unwrap();
        assert_eq!(unlocked.passwords, stored.passwords);
        assert_eq!(session.state(), UnlockState::Unlocked);
        assert_eq!(session.vault(), Some(&vault));
    }

    #[tokio::test]
    async fn test_offline_unlock_wrong_password_fails() {
        let (mut session, vault) = offline_session();
        let bytes = unlock::encode_vault(&sample(&vault, "correct horse")).unwrap();
        session.client().storage().cache_vault(&vault, &bytes, 4).unwrap();

        assert!(session.unlock(&vault, "nope").await.is_err());
        assert_eq!(
            session.state(),
            UnlockState::Failed(crate::ApiError::InvalidPassword)
        );
        assert!(session.unlocked().is_none());
    }

    #[tokio::test]
    async fn test_offline_unlock_without_cache_is_network_error() {
        let (mut session, vault) = offline_session();
        assert!(session.unlock(&vault, "pw").await.is_err());
        assert_eq!(
            session.state(),
            UnlockState::Failed(crate::ApiError::NetworkError)
        );
    }

    #[tokio::test]
    async fn test_locked_session_rejects_writes() {
        let (mut session, _vault) = offline_session();
        assert!(matches!(session.save().await, Err(SpindError::VaultLocked)));
        assert!(matches!(
            session.change_password("x").await,
            Err(SpindError::VaultLocked)
        ));
        assert!(!session.retry_rotation().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_patch_changes_nothing() {
        let (mut session, vault) = offline_session();
        let bytes = unlock::encode_vault(&sample(&vault, "old")).unwrap();
        session.client().storage().cache_vault(&vault, &bytes, 1).unwrap();
        session.unlock(&vault, "old").await.unwrap();
        let before = session.unlocked().unwrap().secret().to_string();

        let result = session.change_password("new").await;
        assert!(matches!(
            result,
            Err(SpindError::Api(crate::ApiError::NetworkError))
        ));
        assert_eq!(session.unlocked().unwrap().secret(), before);
        assert!(session.pending_rotation().is_none());

        // The server may have switched before the connection dropped, so the
        // re-encrypted copy is kept for the next unlock.
        let saved = session.client().storage().pending_rotation(&vault).unwrap().unwrap();
        let opened =
            unlock::unlock_with_password(&vault, &saved, &PasswordCredentials::derive("new"))
                .unwrap();
        assert_eq!(opened.passwords, session.unlocked().unwrap().passwords);
    }

    #[tokio::test]
    async fn test_saved_rotation_ignored_for_other_password() {
        let (mut session, vault) = offline_session();
        let bytes = unlock::encode_vault(&sample(&vault, "old")).unwrap();
        let storage = session.client().storage();
        storage.cache_vault(&vault, &bytes, 1).unwrap();
        let rotated = unlock::encode_vault(&sample(&vault, "new")).unwrap();
        storage.set_pending_rotation(&vault, Some(rotated.as_slice())).unwrap();

        session.unlock(&vault, "old").await.unwrap();
        assert!(session
            .client()
            .storage()
            .pending_rotation(&vault)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_lock_clears_state() {
        let (mut session, vault) = offline_session();
        let bytes = unlock::encode_vault(&sample(&vault, "pw")).unwrap();
        session.client().storage().cache_vault(&vault, &bytes, 1).unwrap();
        session.unlock(&vault, "pw").await.unwrap();

        session.lock();
        assert!(session.unlocked().is_none());
        assert!(session.vault().is_none());
        assert_eq!(session.state(), UnlockState::Locked);
    }
}
