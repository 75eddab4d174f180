// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for persistent storage (overridable with `DATA_DIR`).
pub const DATA_ROOT: &str = "./data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Embedded proof database.
    pub fn proofs_db(&self) -> PathBuf {
        self.root.join("proofs.redb")
    }

    // ========== Notes ==========

    pub fn notes_dir(&self) -> PathBuf {
        self.root.join("notes")
    }

    pub fn note(&self, note_id: &str) -> PathBuf {
        self.notes_dir().join(format!("{note_id}.json"))
    }

    // ========== Folders ==========

    pub fn folders_dir(&self) -> PathBuf {
        self.root.join("folders")
    }

    pub fn folder(&self, folder_id: &str) -> PathBuf {
        self.folders_dir().join(format!("{folder_id}.json"))
    }

    // ========== Subscriptions ==========

    pub fn subscriptions_dir(&self) -> PathBuf {
        self.root.join("subscriptions")
    }

    /// Subscription file for a user. User ids come from the identity
    /// provider and may contain path separators, so the file name is the
    /// hex encoding of the id.
    pub fn subscription(&self, user_id: &str) -> PathBuf {
        self.subscriptions_dir()
            .join(format!("{}.json", alloy::hex::encode(user_id.as_bytes())))
    }

    // ========== Audit Log ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Daily audit events file (JSONL).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
