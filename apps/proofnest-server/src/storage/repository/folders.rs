// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Folder repository.
//!
//! Folders form a per-user tree (`parent_id`). Each folder is a JSON file
//! under `folders/`. Deleting a folder is handled by the API layer together
//! with the proof database: proofs move to the root and child folders move
//! up to the deleted folder's parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{DocumentStore, OwnedResource, StorageError, StorageResult};

/// Maximum folder name length (characters).
pub const MAX_FOLDER_NAME_LEN: usize = 100;

/// Folder stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredFolder {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    /// Parent folder, `None` for top-level folders
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredFolder {
    pub fn new(owner_user_id: &str, name: String, parent_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            name,
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl OwnedResource for StoredFolder {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn resource_label(&self) -> String {
        format!("Folder {}", self.id)
    }
}

/// Trim a folder name and check its length.
pub fn validate_folder_name(raw: &str) -> StorageResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(StorageError::Validation("Folder name is required".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(StorageError::Validation(format!(
            "Folder name must be at most {MAX_FOLDER_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub struct FolderRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> FolderRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn exists(&self, folder_id: &str) -> bool {
        self.storage.exists(self.storage.paths().folder(folder_id))
    }

    pub fn get(&self, folder_id: &str) -> StorageResult<StoredFolder> {
        let path = self.storage.paths().folder(folder_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Folder {folder_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, folder: &StoredFolder) -> StorageResult<()> {
        if self.exists(&folder.id) {
            return Err(StorageError::AlreadyExists(format!("Folder {}", folder.id)));
        }
        self.storage
            .write_json(self.storage.paths().folder(&folder.id), folder)
    }

    pub fn update(&self, folder: &StoredFolder) -> StorageResult<()> {
        if !self.exists(&folder.id) {
            return Err(StorageError::NotFound(format!("Folder {}", folder.id)));
        }
        self.storage
            .write_json(self.storage.paths().folder(&folder.id), folder)
    }

    pub fn delete(&self, folder_id: &str) -> StorageResult<()> {
        if !self.exists(folder_id) {
            return Err(StorageError::NotFound(format!("Folder {folder_id}")));
        }
        self.storage.delete(self.storage.paths().folder(folder_id))
    }

    /// All folders of a user, sorted by name.
    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<StoredFolder>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().folders_dir(), "json")?;

        let mut folders: Vec<StoredFolder> = ids
            .iter()
            .filter_map(|id| self.get(id).ok())
            .filter(|f| f.owner_user_id == owner_user_id)
            .collect();
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(folders)
    }

    /// Load a folder and require that `owner_user_id` owns it. Other users'
    /// folders are reported as not found.
    pub fn get_owned(&self, folder_id: &str, owner_user_id: &str) -> StorageResult<StoredFolder> {
        let folder = self.get(folder_id)?;
        if folder.owner_user_id != owner_user_id {
            return Err(StorageError::NotFound(format!("Folder {folder_id}")));
        }
        Ok(folder)
    }

    /// Check that making `new_parent_id` the parent of `folder_id` keeps the
    /// tree acyclic and within the owner's folders.
    pub fn validate_parent(
        &self,
        folder_id: Option<&str>,
        new_parent_id: &str,
        owner_user_id: &str,
    ) -> StorageResult<()> {
        let mut cursor = Some(self.get_owned(new_parent_id, owner_user_id)?);
        while let Some(current) = cursor {
            if Some(current.id.as_str()) == folder_id {
                return Err(StorageError::Validation(
                    "A folder cannot be moved inside itself".to_string(),
                ));
            }
            cursor = match current.parent_id {
                Some(parent) => Some(self.get_owned(&parent, owner_user_id)?),
                None => None,
            };
        }
        Ok(())
    }

    /// Move the children of `folder_id` to `new_parent`. Returns the number
    /// of folders moved.
    pub fn reparent_children(
        &self,
        folder_id: &str,
        new_parent: Option<&str>,
        owner_user_id: &str,
    ) -> StorageResult<usize> {
        let children: Vec<StoredFolder> = self
            .list_by_owner(owner_user_id)?
            .into_iter()
            .filter(|f| f.parent_id.as_deref() == Some(folder_id))
            .collect();

        for mut child in children.iter().cloned() {
            child.parent_id = new_parent.map(str::to_string);
            child.updated_at = Utc::now();
            self.update(&child)?;
        }
        Ok(children.len())
    }
}
