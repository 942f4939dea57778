//! Subcommand implementations.

use crate::prompt;
use crate::GlobalArgs;
use anyhow::{anyhow, bail, Context, Result};
use spind_core::model::PASSWORD_FIELD;
use spind_core::sync::{ClientConfig, Session, SyncClient};
use spind_core::{
    ClientStorage, FileStorage, Password, PasswordGroup, SecurityQuestion, SpindError, Vault,
};
use tracing::debug;

type CliSession = Session<FileStorage>;

/// Retries offered after the server switched credentials but the upload failed.
const ROTATION_RETRIES: usize = 3;

/// Parse a `key=value` entry field.
pub fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("field name must not be empty".to_string());
    }
    if key == PASSWORD_FIELD {
        return Err("the password field is prompted for, not passed on the command line".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

fn config(global: &GlobalArgs) -> ClientConfig {
    ClientConfig {
        request_timeout_secs: global.timeout,
        data_dir: global.data_dir.clone(),
    }
}

fn storage(global: &GlobalArgs) -> FileStorage {
    FileStorage::new(config(global).data_dir())
}

fn open_session(global: &GlobalArgs) -> Result<CliSession> {
    let config = config(global);
    debug!(data_dir = %config.data_dir().display(), "Opening client storage");
    let client = SyncClient::with_config(FileStorage::new(config.data_dir()), &config)?;
    Ok(Session::new(client))
}

/// Look up a saved vault pointer by its display name.
pub fn find_vault(storage: &impl ClientStorage, name: &str) -> Result<Vault> {
    storage
        .vaults()?
        .into_iter()
        .find(|v| v.name == name)
        .ok_or_else(|| anyhow!("No saved vault named '{}'. Add one with `spind vaults add`.", name))
}

/// Add a pointer, rejecting duplicate names and duplicate accounts.
pub fn add_pointer(storage: &impl ClientStorage, vault: Vault) -> Result<()> {
    let mut vaults = storage.vaults()?;
    if vaults.iter().any(|v| v.name == vault.name) {
        bail!("A vault named '{}' already exists", vault.name);
    }
    if let Some(existing) = vaults.iter().find(|v| v.same_address_and_username(&vault)) {
        bail!(
            "{} at {} is already saved as '{}'",
            vault.username,
            vault.address,
            existing.name
        );
    }
    vaults.push(vault);
    storage.set_vaults(&vaults)?;
    Ok(())
}

/// Remove a pointer. Cached data for it stays on disk.
pub fn remove_pointer(storage: &impl ClientStorage, name: &str) -> Result<()> {
    let mut vaults = storage.vaults()?;
    let before = vaults.len();
    vaults.retain(|v| v.name != name);
    if vaults.len() == before {
        bail!("No saved vault named '{}'", name);
    }
    storage.set_vaults(&vaults)?;
    Ok(())
}

pub fn vaults_add(global: &GlobalArgs, name: String, address: String, username: String) -> Result<()> {
    let address = address.trim_end_matches('/').to_string();
    add_pointer(&storage(global), Vault::new(name.clone(), address, username))?;
    println!("Saved vault '{}'", name);
    Ok(())
}

pub fn vaults_list(global: &GlobalArgs) -> Result<()> {
    let vaults = storage(global).vaults()?;
    if vaults.is_empty() {
        println!("No saved vaults");
        return Ok(());
    }
    for vault in vaults {
        println!("{:<16} {}@{}", vault.name, vault.username, vault.address);
    }
    Ok(())
}

pub fn vaults_remove(global: &GlobalArgs, name: &str) -> Result<()> {
    remove_pointer(&storage(global), name)?;
    println!("Removed vault '{}'", name);
    Ok(())
}

async fn ask_answers(questions: &[String]) -> Result<Vec<SecurityQuestion>> {
    let mut answered = Vec::with_capacity(questions.len());
    for question in questions {
        let answer = prompt::secret(question).await?;
        if answer.is_empty() {
            bail!("Answers must not be empty");
        }
        answered.push(SecurityQuestion::new(question.clone(), answer.as_str()));
    }
    Ok(answered)
}

async fn unlock(global: &GlobalArgs, name: &str) -> Result<CliSession> {
    let vault = find_vault(&storage(global), name)?;
    let password = prompt::secret("Master password").await?;
    let mut session = open_session(global)?;
    session
        .unlock(&vault, &password)
        .await
        .with_context(|| format!("Could not unlock '{}'", name))?;
    Ok(session)
}

/// Drive a rotation result to completion, offering retries when only the
/// upload failed.
async fn finish_rotation(session: &mut CliSession, result: spind_core::Result<()>) -> Result<()> {
    let mut source = match result {
        Ok(()) => return Ok(()),
        Err(SpindError::PartialRotation { source, .. }) => source,
        Err(e) => return Err(e.into()),
    };

    for _ in 0..ROTATION_RETRIES {
        eprintln!(
            "The server accepted the new credentials but the vault upload failed: {}",
            source
        );
        if !prompt::confirm("Retry the upload now?", true).await? {
            break;
        }
        match session.retry_rotation().await {
            Ok(_) => return Ok(()),
            Err(SpindError::PartialRotation { source: next, .. }) => source = next,
            Err(e) => return Err(e.into()),
        }
    }

    bail!(
        "Vault upload did not complete ({}). The server now expects the new credentials \
         but still holds the vault encrypted under the old ones. The re-encrypted copy is \
         saved locally; run `spind show <vault>` with the new master password to finish the upload.",
        source
    )
}

/// Warning shown before storing credentials without security questions.
fn no_recovery_warning(questions: &[String]) -> Option<&'static str> {
    questions.is_empty().then_some(
        "No security questions given. Without them a forgotten master password cannot be \
         recovered, and an interrupted credential change can only be finished from this device.",
    )
}

/// Print the recovery warning and ask whether to go on. `true` when there is nothing to warn about.
async fn accept_without_recovery(questions: &[String]) -> Result<bool> {
    let Some(warning) = no_recovery_warning(questions) else {
        return Ok(true);
    };
    eprintln!("{}", warning);
    prompt::confirm("Continue without recovery?", false).await
}

pub async fn setup(global: &GlobalArgs, name: &str, questions: Vec<String>) -> Result<()> {
    let vault = find_vault(&storage(global), name)?;
    if !accept_without_recovery(&questions).await? {
        bail!("Setup cancelled");
    }
    let password = prompt::new_secret("Master password").await?;
    let answered = ask_answers(&questions).await?;

    let mut session = open_session(global)?;
    let result = session.setup(&vault, &password, answered).await.map(|_| ());
    finish_rotation(&mut session, result).await?;

    println!("Vault '{}' is ready", name);
    Ok(())
}

fn print_group(group: &PasswordGroup, path: &str, index: &mut usize, reveal: bool) {
    for child in &group.groups {
        let child_path = if path.is_empty() {
            child.name.clone()
        } else {
            format!("{}/{}", path, child.name)
        };
        print_group(child, &child_path, index, reveal);
    }
    for password in &group.passwords {
        print_entry(password, path, *index, reveal);
        *index += 1;
    }
}

fn print_entry(password: &Password, path: &str, index: usize, reveal: bool) {
    if path.is_empty() {
        println!("[{}] {}", index, password.name);
    } else {
        println!("[{}] {}/{}", index, path, password.name);
    }
    for (key, value) in &password.fields {
        let shown = if reveal || key != PASSWORD_FIELD {
            value.as_str()
        } else {
            "********"
        };
        println!("      {}: {}", key, shown);
    }
}

pub async fn show(global: &GlobalArgs, name: &str, reveal: bool) -> Result<()> {
    let session = unlock(global, name).await?;
    let unlocked = session.unlocked().ok_or(SpindError::VaultLocked)?;

    if unlocked.passwords.is_empty() {
        println!("Vault '{}' has no entries", name);
        return Ok(());
    }
    let mut index = 0;
    print_group(&unlocked.passwords, "", &mut index, reveal);
    Ok(())
}

pub async fn add_entry(
    global: &GlobalArgs,
    name: &str,
    entry: String,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let mut session = unlock(global, name).await?;
    let secret = prompt::secret("Entry password (empty for none)").await?;

    let mut password = Password::new(entry.clone());
    for (key, value) in fields {
        password = password.with_field(key, value);
    }
    if !secret.is_empty() {
        password = password.with_field(PASSWORD_FIELD, secret.as_str());
    }

    session
        .unlocked_mut()
        .ok_or(SpindError::VaultLocked)?
        .passwords
        .push(password);
    let revision = session.save().await?;
    println!("Added '{}' (revision {})", entry, revision);
    Ok(())
}

pub async fn remove_entry(global: &GlobalArgs, name: &str, index: usize) -> Result<()> {
    let mut session = unlock(global, name).await?;
    let removed = session
        .unlocked_mut()
        .ok_or(SpindError::VaultLocked)?
        .passwords
        .remove(index)?;
    let revision = session.save().await?;
    println!("Removed '{}' (revision {})", removed.name, revision);
    Ok(())
}

pub async fn passwd(global: &GlobalArgs, name: &str) -> Result<()> {
    let mut session = unlock(global, name).await?;
    let new_password = prompt::new_secret("New master password").await?;

    let result = session.change_password(&new_password).await;
    finish_rotation(&mut session, result).await?;
    println!("Master password changed");
    Ok(())
}

pub async fn security(global: &GlobalArgs, name: &str, questions: Vec<String>) -> Result<()> {
    if !accept_without_recovery(&questions).await? {
        bail!("Security questions left unchanged");
    }
    let mut session = unlock(global, name).await?;
    let answered = ask_answers(&questions).await?;

    let result = session.update_security(answered).await;
    finish_rotation(&mut session, result).await?;
    if questions.is_empty() {
        println!("Security questions removed; recovery is disabled");
    } else {
        println!("Security questions updated");
    }
    Ok(())
}

pub async fn recover(global: &GlobalArgs, name: &str) -> Result<()> {
    let vault = find_vault(&storage(global), name)?;
    let mut session = open_session(global)?;

    let questions = session.client().security_questions(&vault).await?;
    let mut answers = Vec::with_capacity(questions.len());
    for question in &questions {
        answers.push(prompt::secret(question).await?);
    }

    let answer_refs: Vec<&str> = answers.iter().map(|a| a.as_str()).collect();
    session
        .recover(&vault, &answer_refs)
        .await
        .context("Recovery failed")?;
    drop(answer_refs);
    drop(answers);

    let new_password = prompt::new_secret("New master password").await?;
    let result = session.change_password(&new_password).await;
    finish_rotation(&mut session, result).await?;
    println!("Vault '{}' recovered with a new master password", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spind_core::MemoryStorage;

    #[test]
    fn field_parsing() {
        assert_eq!(
            parse_field("url=https://a.example/?q=1").unwrap(),
            ("url".to_string(), "https://a.example/?q=1".to_string())
        );
        assert_eq!(parse_field("note=").unwrap().1, "");
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
        assert!(parse_field("password=hunter2").is_err());
    }

    #[test]
    fn warns_only_without_questions() {
        let warning = no_recovery_warning(&[]).unwrap();
        assert!(warning.contains("cannot be recovered"));
        assert!(no_recovery_warning(&["First pet?".to_string()]).is_none());
    }

    #[test]
    fn pointers_are_unique_by_name_and_account() {
        let storage = MemoryStorage::new();
        add_pointer(&storage, Vault::new("home", "https://a.example", "alice")).unwrap();

        let same_name = add_pointer(&storage, Vault::new("home", "https://b.example", "bob"));
        assert!(same_name.unwrap_err().to_string().contains("already exists"));

        let same_account = add_pointer(&storage, Vault::new("work", "https://a.example", "alice"));
        assert!(same_account.unwrap_err().to_string().contains("'home'"));

        add_pointer(&storage, Vault::new("work", "https://a.example", "bob")).unwrap();
        assert_eq!(storage.vaults().unwrap().len(), 2);
        assert_eq!(find_vault(&storage, "work").unwrap().username, "bob");
    }

    #[test]
    fn removing_pointers() {
        let storage = MemoryStorage::new();
        add_pointer(&storage, Vault::new("home", "https://a.example", "alice")).unwrap();

        assert!(remove_pointer(&storage, "missing").is_err());
        remove_pointer(&storage, "home").unwrap();
        assert!(find_vault(&storage, "home").is_err());
    }
}
