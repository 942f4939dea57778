//! End-to-end tests: the core sync client and session against a live server.

mod common;

use common::{spawn_server, spawn_with, FlakyStorage};
use spind_core::storage::MemoryStorage;
use spind_core::sync::{Session, SyncClient};
use spind_core::{
    ApiError, ClientStorage, Password, PasswordCredentials, SecurityQuestion, SpindError,
    UnlockState, Vault,
};
use spind_server::{ServerConfig, VaultStorage};
use std::sync::Arc;

fn session() -> Session<MemoryStorage> {
    Session::new(SyncClient::new(MemoryStorage::new()).unwrap())
}

fn questions() -> Vec<SecurityQuestion> {
    vec![
        SecurityQuestion::new("First pet?", "Rex"),
        SecurityQuestion::new("Birth city?", "Berlin"),
    ]
}

fn api_error<T: std::fmt::Debug>(result: spind_core::Result<T>) -> ApiError {
    match result {
        Err(e) => e.api_error(),
        Ok(v) => panic!("expected error, got {:?}", v),
    }
}

#[tokio::test]
async fn setup_unlock_save_across_devices() {
    let (base, storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");

    let mut laptop = session();
    laptop.setup(&vault, "correct horse", questions()).await.unwrap();
    assert_eq!(storage.revision("alice").unwrap(), 1);

    laptop
        .unlocked_mut()
        .unwrap()
        .passwords
        .push(Password::new("mail").with_field("password", "pw1"));
    assert_eq!(laptop.save().await.unwrap(), 2);

    // A second device with an empty cache sees the latest revision
    let mut phone = session();
    let unlocked = phone.unlock(&vault, "correct horse").await.unwrap();
    assert_eq!(unlocked.passwords.get(0).unwrap().password(), Some("pw1"));
    assert_eq!(unlocked.security_questions, questions());
    assert_eq!(phone.client().storage().cached_revision(&vault).unwrap(), Some(2));

    // Wrong password is rejected by the server before any decryption
    let mut thief = session();
    let result = thief.unlock(&vault, "battery staple").await;
    assert_eq!(api_error(result), ApiError::InvalidCredentials);
    assert_eq!(thief.state(), UnlockState::Failed(ApiError::InvalidCredentials));
}

#[tokio::test]
async fn revision_monotonic_and_not_modified() {
    let (base, storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");
    let creds = PasswordCredentials::derive("pw");

    let mut owner = session();
    owner.setup(&vault, "pw", Vec::new()).await.unwrap();

    let client = owner.client();
    let first = client.fetch(&vault, creds.secret()).await.unwrap();
    let revision = client.storage().cached_revision(&vault).unwrap().unwrap();
    assert_eq!(revision, storage.revision("alice").unwrap());

    // Second fetch is answered from cache via 304
    let second = client.fetch(&vault, creds.secret()).await.unwrap();
    assert_eq!(first, second);

    // Each upload advances the revision by one
    for expected in revision + 1..revision + 4 {
        assert_eq!(owner.save().await.unwrap(), expected);
        assert_eq!(storage.revision("alice").unwrap(), expected);
    }
}

#[tokio::test]
async fn recovery_with_answers() {
    let (base, _storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");

    let mut owner = session();
    owner.setup(&vault, "forgotten", questions()).await.unwrap();
    owner
        .unlocked_mut()
        .unwrap()
        .passwords
        .push(Password::new("bank").with_field("password", "1234"));
    owner.save().await.unwrap();
    let original_secret = owner.unlocked().unwrap().secret().to_string();

    let mut other = session();
    let listed = other.client().security_questions(&vault).await.unwrap();
    assert_eq!(listed, ["First pet?", "Birth city?"]);

    let wrong = other.recover(&vault, &["Rex", "Paris"]).await;
    assert_eq!(api_error(wrong), ApiError::InvalidCredentials);

    let recovered = other.recover(&vault, &["Rex", "Berlin"]).await.unwrap();
    assert_eq!(recovered.secret(), original_secret);
    assert_eq!(recovered.passwords.get(0).unwrap().name, "bank");

    // Recovery then sets a new password
    other.change_password("remembered").await.unwrap();
    let mut fresh = session();
    assert!(fresh.unlock(&vault, "remembered").await.is_ok());
    assert_eq!(
        api_error(fresh.unlock(&vault, "forgotten").await),
        ApiError::InvalidCredentials
    );
}

#[tokio::test]
async fn recovery_without_questions_is_not_possible() {
    let (base, _storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");
    session().setup(&vault, "pw", Vec::new()).await.unwrap();

    let other = session();
    assert_eq!(
        api_error(other.client().security_questions(&vault).await),
        ApiError::RecoveryNotPossible
    );
}

#[tokio::test]
async fn update_security_replaces_questions() {
    let (base, _storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");

    let mut owner = session();
    owner.setup(&vault, "pw", questions()).await.unwrap();
    owner
        .update_security(vec![SecurityQuestion::new("Favourite colour?", "green")])
        .await
        .unwrap();

    let mut other = session();
    assert_eq!(
        other.client().security_questions(&vault).await.unwrap(),
        ["Favourite colour?"]
    );
    assert!(other.recover(&vault, &["Rex", "Berlin"]).await.is_err());
    assert!(other.recover(&vault, &["green"]).await.is_ok());
}

#[tokio::test]
async fn partial_rotation_can_be_retried() {
    let storage = Arc::new(FlakyStorage::new());
    storage.create("alice").unwrap();
    let base = spawn_server(storage.clone(), ServerConfig::default()).await;
    let vault = Vault::new("Home", base, "alice");

    let mut owner = session();
    owner.setup(&vault, "old", Vec::new()).await.unwrap();

    storage.set_failing(true);
    match owner.change_password("new").await {
        Err(SpindError::PartialRotation { vault: rotated, source }) => {
            assert_eq!(source, ApiError::InternalServerError);
            assert_eq!(rotated.secret(), PasswordCredentials::derive("new").secret());
        }
        other => panic!("expected partial rotation, got {:?}", other),
    }
    // The server already switched; the session still holds the old vault
    assert_eq!(
        owner.unlocked().unwrap().secret(),
        PasswordCredentials::derive("old").secret()
    );
    assert!(owner.pending_rotation().is_some());

    storage.set_failing(false);
    assert!(owner.retry_rotation().await.unwrap());
    assert!(owner.pending_rotation().is_none());
    assert_eq!(
        owner.unlocked().unwrap().secret(),
        PasswordCredentials::derive("new").secret()
    );

    let mut other = session();
    assert!(other.unlock(&vault, "new").await.is_ok());
}

#[tokio::test]
async fn unlock_with_new_password_finishes_rotation_after_lock() {
    let storage = Arc::new(FlakyStorage::new());
    storage.create("alice").unwrap();
    let base = spawn_server(storage.clone(), ServerConfig::default()).await;
    let vault = Vault::new("Home", base, "alice");

    let mut owner = session();
    owner.setup(&vault, "old", Vec::new()).await.unwrap();
    owner
        .unlocked_mut()
        .unwrap()
        .passwords
        .push(Password::new("mail").with_field("password", "pw1"));
    owner.save().await.unwrap();

    storage.set_failing(true);
    let result = owner.change_password("new").await;
    assert!(matches!(result, Err(SpindError::PartialRotation { .. })));
    storage.set_failing(false);

    owner.lock();
    assert!(owner.pending_rotation().is_none());
    assert!(owner
        .client()
        .storage()
        .pending_rotation(&vault)
        .unwrap()
        .is_some());

    // The server only takes the new secret now
    assert_eq!(
        api_error(owner.unlock(&vault, "old").await),
        ApiError::InvalidCredentials
    );
    // The saved copy is still there after a failed unlock
    let unlocked = owner.unlock(&vault, "new").await.unwrap();
    assert_eq!(unlocked.passwords.get(0).unwrap().password(), Some("pw1"));
    assert_eq!(
        unlocked.secret(),
        PasswordCredentials::derive("new").secret()
    );
    assert!(owner
        .client()
        .storage()
        .pending_rotation(&vault)
        .unwrap()
        .is_none());
    assert_eq!(storage.revision("alice").unwrap(), 3);

    let mut other = session();
    let unlocked = other.unlock(&vault, "new").await.unwrap();
    assert_eq!(unlocked.passwords.get(0).unwrap().password(), Some("pw1"));
}

#[tokio::test]
async fn stale_saved_rotation_is_dropped() {
    let (base, _storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");

    let mut owner = session();
    owner.setup(&vault, "pw", Vec::new()).await.unwrap();
    owner.lock();

    // A rotation the server never heard of cannot be uploaded
    let stray = spind_core::UnlockedVault::new_empty(
        &vault,
        &PasswordCredentials::derive("other"),
        Vec::new(),
    );
    let data = spind_core::unlock::encode_vault(&stray).unwrap();
    owner
        .client()
        .storage()
        .set_pending_rotation(&vault, Some(data.as_slice()))
        .unwrap();

    assert_eq!(
        api_error(owner.unlock(&vault, "other").await),
        ApiError::InvalidCredentials
    );
    assert!(owner
        .client()
        .storage()
        .pending_rotation(&vault)
        .unwrap()
        .is_none());
    assert!(owner.unlock(&vault, "pw").await.is_ok());
}

#[tokio::test]
async fn offline_unlock_uses_cache() {
    let (base, _storage) = spawn_with(&["alice"]).await;
    let vault = Vault::new("Home", base, "alice");

    let cache = MemoryStorage::new();
    let mut owner = Session::new(SyncClient::new(cache).unwrap());
    owner.setup(&vault, "pw", Vec::new()).await.unwrap();
    let cached = owner
        .client()
        .storage()
        .cached_vault(&vault)
        .unwrap()
        .unwrap();

    // Same account, server gone
    let offline = Vault::new("Home", "http://127.0.0.1:1", "alice");
    let storage = MemoryStorage::new();
    storage.cache_vault(&offline, &cached, 1).unwrap();
    let mut traveller = Session::new(SyncClient::new(storage).unwrap());
    assert!(traveller.unlock(&offline, "pw").await.is_ok());
}
