//! Stored vault record types.

/// Container bytes and the revision they were uploaded as, read together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub revision: u64,
}
