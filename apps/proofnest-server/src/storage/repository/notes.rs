// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Note repository.
//!
//! A note holds the normalized content behind a proof. Each note is stored
//! as a separate JSON file under `notes/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{DocumentStore, OwnedResource, StorageError, StorageResult};

/// Note stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredNote {
    pub id: String,
    pub owner_user_id: String,
    /// Normalized content
    pub content: String,
    /// Fingerprint of `content`
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StoredNote {
    pub fn new(owner_user_id: &str, content: String, content_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            content,
            content_hash,
            created_at: Utc::now(),
        }
    }
}

impl OwnedResource for StoredNote {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn resource_label(&self) -> String {
        format!("Note {}", self.id)
    }
}

pub struct NoteRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> NoteRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    pub fn get(&self, note_id: &str) -> StorageResult<StoredNote> {
        let path = self.storage.paths().note(note_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Note {note_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, note: &StoredNote) -> StorageResult<()> {
        let path = self.storage.paths().note(&note.id);
        if self.storage.exists(&path) {
            return Err(StorageError::AlreadyExists(format!("Note {}", note.id)));
        }
        self.storage.write_json(path, note)
    }

    pub fn delete(&self, note_id: &str) -> StorageResult<()> {
        let path = self.storage.paths().note(note_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Note {note_id}")));
        }
        self.storage.delete(path)
    }

    /// Ids of the user's notes whose content contains `needle`
    /// (case-insensitive).
    pub fn search_ids(&self, owner_user_id: &str, needle: &str) -> StorageResult<Vec<String>> {
        let needle = needle.to_lowercase();
        let ids = self
            .storage
            .list_files(self.storage.paths().notes_dir(), "json")?;

        let mut matches = Vec::new();
        for id in ids {
            if let Ok(note) = self.get(&id) {
                if note.owner_user_id == owner_user_id
                    && note.content.to_lowercase().contains(&needle)
                {
                    matches.push(note.id);
                }
            }
        }
        Ok(matches)
    }
}
