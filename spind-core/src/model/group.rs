//! Password folder tree with flattened indexing.
//!
//! Entries are addressed by one integer produced by a depth-first walk:
//! every subgroup in order, fully expanded, then the group's own entries.

use crate::model::Password;
use crate::{Result, SpindError};
use serde::{Deserialize, Serialize};

/// A folder of passwords and nested folders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordGroup {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<PasswordGroup>,
    #[serde(default)]
    pub passwords: Vec<Password>,
}

impl PasswordGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            passwords: Vec::new(),
        }
    }

    /// Number of entries in this group and all subgroups.
    pub fn total_size(&self) -> usize {
        self.passwords.len() + self.groups.iter().map(PasswordGroup::total_size).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.total_size() == 0
    }

    /// Entry at a flattened index.
    pub fn get(&self, index: usize) -> Result<&Password> {
        self.find(index).ok_or_else(|| self.out_of_bounds(index))
    }

    /// Mutable entry at a flattened index.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut Password> {
        let len = self.total_size();
        self.find_mut(index)
            .ok_or(SpindError::IndexOutOfBounds { index, len })
    }

    /// Replace the entry at a flattened index, returning the old one.
    pub fn set(&mut self, index: usize, password: Password) -> Result<Password> {
        let slot = self.get_mut(index)?;
        Ok(std::mem::replace(slot, password))
    }

    /// Remove the entry at a flattened index.
    ///
    /// Entries before `index` keep their indices; entries after shift down by one.
    pub fn remove(&mut self, index: usize) -> Result<Password> {
        let len = self.total_size();
        self.remove_at(index)
            .ok_or(SpindError::IndexOutOfBounds { index, len })
    }

    /// Append an entry to this group's own entries.
    pub fn push(&mut self, password: Password) {
        self.passwords.push(password);
    }

    /// All entries in flattened index order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Password> + '_> {
        Box::new(
            self.groups
                .iter()
                .flat_map(|group| group.iter())
                .chain(self.passwords.iter()),
        )
    }

    fn find(&self, mut index: usize) -> Option<&Password> {
        for group in &self.groups {
            let size = group.total_size();
            if index < size {
                return group.find(index);
            }
            index -= size;
        }
        self.passwords.get(index)
    }

    fn find_mut(&mut self, mut index: usize) -> Option<&mut Password> {
        for group in &mut self.groups {
            let size = group.total_size();
            if index < size {
                return group.find_mut(index);
            }
            index -= size;
        }
        self.passwords.get_mut(index)
    }

    fn remove_at(&mut self, mut index: usize) -> Option<Password> {
        for group in &mut self.groups {
            let size = group.total_size();
            if index < size {
                return group.remove_at(index);
            }
            index -= size;
        }
        if index < self.passwords.len() {
            Some(self.passwords.remove(index))
        } else {
            None
        }
    }

    fn out_of_bounds(&self, index: usize) -> SpindError {
        SpindError::IndexOutOfBounds {
            index,
            len: self.total_size(),
        }
    }

    pub(crate) fn wipe(&mut self) {
        for group in &mut self.groups {
            group.wipe();
        }
        for password in &mut self.passwords {
            password.wipe();
        }
    }
}
