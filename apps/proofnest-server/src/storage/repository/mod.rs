// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Repository layer providing typed access to the document store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using the DocumentStore for all file operations.

pub mod folders;
pub mod notes;
pub mod subscriptions;

pub use folders::{validate_folder_name, FolderRepository, StoredFolder, MAX_FOLDER_NAME_LEN};
pub use notes::{NoteRepository, StoredNote};
pub use subscriptions::{StoredSubscription, SubscriptionRepository, SubscriptionStatus};
