//! Binary vault container.
//!
//! # Layout (version 1, big-endian)
//!
//! ```text
//! i32 version
//! i32 len | primary-encrypted payload
//! i32 len | security questions (JSON array of strings)
//! -- only when the question list is non-empty --
//! i32 len | answers, encrypted under the primary key
//! i32 len | password hash, encrypted under the backup key
//! ```
//!
//! The codec only frames blobs. Encryption happens in [`crate::unlock`].
//! Bytes after the last expected section are ignored; older writers
//! always appended both backup sections even without questions.

use crate::api::ApiError;
use crate::Result;

/// Current container format version.
pub const FORMAT_VERSION: i32 = 1;

const LEN_PREFIX: usize = 4;

/// The demultiplexed container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedVault {
    /// Password tree JSON, encrypted under the primary key.
    pub password_encrypted_data: Vec<u8>,
    /// Question texts, in clear.
    pub security_questions: Vec<String>,
    /// Answers JSON, encrypted under the primary key. Present iff questions are.
    pub password_encrypted_answers: Option<Vec<u8>>,
    /// Raw password hash, encrypted under the backup key. Present iff questions are.
    pub backup_encrypted_password_hash: Option<Vec<u8>>,
}

impl DecodedVault {
    /// Whether the container carries backup material for recovery.
    pub fn has_backup(&self) -> bool {
        self.backup_encrypted_password_hash.is_some()
    }
}

/// Decode a container.
///
/// # Errors
/// - [`ApiError::VaultVersionTooOld`] / [`ApiError::VaultVersionTooNew`] on a version mismatch
/// - [`ApiError::CorruptedVault`] on truncated sections, negative lengths or bad question JSON
pub fn decode(data: &[u8]) -> Result<DecodedVault> {
    let mut reader = Reader::new(data);
    let version = reader.read_i32()?;

    if version < FORMAT_VERSION {
        return Err(ApiError::VaultVersionTooOld.into());
    }
    if version > FORMAT_VERSION {
        return Err(ApiError::VaultVersionTooNew.into());
    }

    decode_v1(&mut reader)
}

fn decode_v1(reader: &mut Reader<'_>) -> Result<DecodedVault> {
    let password_encrypted_data = reader.read_section()?.to_vec();
    let questions_json = reader.read_section()?;
    let security_questions: Vec<String> =
        serde_json::from_slice(questions_json).map_err(|_| ApiError::CorruptedVault)?;

    let (password_encrypted_answers, backup_encrypted_password_hash) =
        if security_questions.is_empty() {
            (None, None)
        } else {
            (
                Some(reader.read_section()?.to_vec()),
                Some(reader.read_section()?.to_vec()),
            )
        };

    Ok(DecodedVault {
        password_encrypted_data,
        security_questions,
        password_encrypted_answers,
        backup_encrypted_password_hash,
    })
}

/// Encode a container. Exact inverse of [`decode`].
///
/// The backup sections must be present exactly when there are questions.
pub fn encode(vault: &DecodedVault) -> Result<Vec<u8>> {
    let questions_json = serde_json::to_vec(&vault.security_questions)?;

    let backup = match (
        vault.security_questions.is_empty(),
        &vault.password_encrypted_answers,
        &vault.backup_encrypted_password_hash,
    ) {
        (true, None, None) => None,
        (false, Some(answers), Some(hash)) => Some((answers, hash)),
        _ => return Err(ApiError::CorruptedVault.into()),
    };

    let mut out = Vec::with_capacity(
        LEN_PREFIX * 5
            + vault.password_encrypted_data.len()
            + questions_json.len()
            + backup.map_or(0, |(a, h)| a.len() + h.len()),
    );
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    write_section(&mut out, &vault.password_encrypted_data)?;
    write_section(&mut out, &questions_json)?;
    if let Some((answers, hash)) = backup {
        write_section(&mut out, answers)?;
        write_section(&mut out, hash)?;
    }
    Ok(out)
}

fn write_section(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len()).map_err(|_| ApiError::CorruptedVault)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ApiError::CorruptedVault)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes: [u8; LEN_PREFIX] = self
            .take(LEN_PREFIX)?
            .try_into()
            .map_err(|_| ApiError::CorruptedVault)?;
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_section(&mut self) -> Result<&'a [u8]> {
        let len = usize::try_from(self.read_i32()?).map_err(|_| ApiError::CorruptedVault)?;
        self.take(len)
    }
}
