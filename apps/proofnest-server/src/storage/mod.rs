// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! # Storage Module
//!
//! Off-chain persistence for ProofNest.
//!
//! - **Proof database** ([`ProofDatabase`]): redb file holding every proof
//!   plus the indexes used for listing, quota counting, duplicate lookup and
//!   reconciliation.
//! - **Document store** ([`DocumentStore`]): one JSON file per note, folder
//!   and subscription, written atomically.
//! - **Audit log**: one JSONL file per day.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   proofs.redb
//!   notes/{note_id}.json
//!   folders/{folder_id}.json
//!   subscriptions/{hex(user_id)}.json
//!   audit/{date}/events.jsonl
//! ```

pub mod audit;
pub mod document_store;
pub mod ownership;
pub mod paths;
pub mod proof_cache;
pub mod proof_database;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use document_store::{DocumentStore, StorageError, StorageResult};
pub use ownership::{OwnedResource, OwnershipCheck, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use proof_cache::ProofCache;
pub use proof_database::{ProofDatabase, ProofDbError, ProofPage, ProofStatus, StoredProof};
pub use repository::{
    validate_folder_name, FolderRepository, NoteRepository, StoredFolder, StoredNote,
    StoredSubscription, SubscriptionRepository, SubscriptionStatus,
};
