// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Embedded proof database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `proofs`: proof id → serialized StoredProof
//! - `user_proof_index`: composite key (owner|!created_at|id) → proof id
//! - `content_hash_index`: `content_hash|id` → proof id
//! - `pending_proofs`: proof id → created_at (ms), pending proofs that carry
//!   an anchoring tx (the reconciler's work queue)
//! - `tx_proof_index`: anchoring tx hash → proof id
//! - `payment_txs`: payment tx hash → user id (applied subscription payments)
//! - `meta`: key → value (reconciler checkpoint)

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnedResource;
use crate::blockchain::OnChainProof;

// =============================================================================
// Table Definitions
// =============================================================================

const PROOFS: TableDefinition<&str, &[u8]> = TableDefinition::new("proofs");

/// Key format: `len(owner) u16 BE | owner | !created_at_ms BE | proof_id`.
/// The inverted timestamp yields newest-first order on forward scans; the
/// length prefix keeps owners that are prefixes of each other apart.
const USER_PROOF_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("user_proof_index");

const CONTENT_HASH_INDEX: TableDefinition<&str, &str> = TableDefinition::new("content_hash_index");

const PENDING_PROOFS: TableDefinition<&str, i64> = TableDefinition::new("pending_proofs");

const TX_PROOF_INDEX: TableDefinition<&str, &str> = TableDefinition::new("tx_proof_index");

const PAYMENT_TXS: TableDefinition<&str, &str> = TableDefinition::new("payment_txs");

const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const LAST_RECONCILED_KEY: &str = "last_reconciled_at";

// =============================================================================
// Stored types
// =============================================================================

/// Lifecycle of a proof's on-chain anchor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Proof record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StoredProof {
    pub id: String,
    pub owner_user_id: String,
    /// Note holding the proof's content
    pub note_id: String,
    /// SHA-256 fingerprint (64 lowercase hex chars)
    pub content_hash: String,
    /// Network key (`sepolia`, `local`)
    pub chain: String,
    /// Anchoring transaction, once submitted
    pub tx_hash: Option<String>,
    pub status: ProofStatus,
    pub folder_id: Option<String>,
    pub block_number: Option<u64>,
    /// On-chain owner recorded by the contract
    pub anchored_by: Option<String>,
    /// On-chain timestamp recorded by the contract
    pub anchored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredProof {
    /// New proof awaiting an anchor transaction.
    pub fn new_pending(
        owner_user_id: &str,
        note_id: &str,
        content_hash: &str,
        chain: &str,
        folder_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            note_id: note_id.to_string(),
            content_hash: content_hash.to_string(),
            chain: chain.to_string(),
            tx_hash: None,
            status: ProofStatus::Pending,
            folder_id,
            block_number: None,
            anchored_by: None,
            anchored_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a submitted anchor transaction; the proof goes (back) to pending.
    pub fn attach_tx(&mut self, tx_hash: String) {
        self.tx_hash = Some(tx_hash);
        self.status = ProofStatus::Pending;
        self.block_number = None;
        self.anchored_by = None;
        self.anchored_at = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_confirmed(&mut self, block_number: u64, record: &OnChainProof) {
        self.status = ProofStatus::Confirmed;
        self.block_number = Some(block_number);
        self.anchored_by = Some(record.owner_hex());
        self.anchored_at = Some(record.timestamp_utc());
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, block_number: Option<u64>) {
        self.status = ProofStatus::Failed;
        self.block_number = block_number;
        self.updated_at = Utc::now();
    }
}

impl OwnedResource for StoredProof {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn resource_label(&self) -> String {
        format!("Proof {}", self.id)
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProofDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("quota reached: {used} proofs in the current window")]
    QuotaReached { used: u64 },
}

pub type ProofDbResult<T> = Result<T, ProofDbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

fn owner_prefix(owner_user_id: &str) -> Vec<u8> {
    let owner = owner_user_id.as_bytes();
    let len = u16::try_from(owner.len()).unwrap_or(u16::MAX);
    let mut prefix = Vec::with_capacity(2 + owner.len());
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(owner);
    prefix
}

fn owner_prefix_end(owner_user_id: &str) -> Vec<u8> {
    let mut end = owner_prefix(owner_user_id);
    end.extend_from_slice(&[0xFF; 9]);
    end
}

fn make_index_key(owner_user_id: &str, created_at: DateTime<Utc>, proof_id: &str) -> Vec<u8> {
    let mut key = owner_prefix(owner_user_id);
    let millis = created_at.timestamp_millis().max(0) as u64;
    key.extend_from_slice(&(u64::MAX - millis).to_be_bytes());
    key.extend_from_slice(proof_id.as_bytes());
    key
}

/// Creation time (ms) encoded in an index key, given the owner prefix length.
fn index_key_millis(key: &[u8], prefix_len: usize) -> Option<i64> {
    let bytes: [u8; 8] = key.get(prefix_len..prefix_len + 8)?.try_into().ok()?;
    i64::try_from(u64::MAX - u64::from_be_bytes(bytes)).ok()
}

fn hash_index_key(content_hash: &str, proof_id: &str) -> String {
    format!("{content_hash}|{proof_id}")
}

/// Whether the reconciler has a receipt to look for.
fn awaits_receipt(proof: &StoredProof) -> bool {
    proof.status == ProofStatus::Pending && proof.tx_hash.is_some()
}

/// Count an owner's index entries created at or after `since`.
fn count_created_since(
    index: &impl ReadableTable<&'static [u8], &'static str>,
    owner_user_id: &str,
    since: DateTime<Utc>,
) -> ProofDbResult<u64> {
    let start = owner_prefix(owner_user_id);
    let end = owner_prefix_end(owner_user_id);
    let since_ms = since.timestamp_millis();

    let mut count = 0;
    for entry in index.range(start.as_slice()..end.as_slice())? {
        let (key, _) = entry?;
        match index_key_millis(key.value(), start.len()) {
            Some(created) if created >= since_ms => count += 1,
            // Newest first: everything after this is older
            _ => break,
        }
    }
    Ok(count)
}

// =============================================================================
// ProofDatabase
// =============================================================================

/// Embedded ACID proof database.
pub struct ProofDatabase {
    db: Database,
}

impl ProofDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> ProofDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROOFS)?;
            let _ = write_txn.open_table(USER_PROOF_INDEX)?;
            let _ = write_txn.open_table(CONTENT_HASH_INDEX)?;
            let _ = write_txn.open_table(PENDING_PROOFS)?;
            let _ = write_txn.open_table(TX_PROOF_INDEX)?;
            let _ = write_txn.open_table(PAYMENT_TXS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Proof CRUD
    // =========================================================================

    /// Insert a new proof and all its index entries.
    pub fn insert_proof(&self, proof: &StoredProof) -> ProofDbResult<()> {
        self.insert_with_limit(proof, None)
    }

    /// Insert a new proof unless its owner already created `limit` proofs
    /// since `window_start`. Counting and inserting share one write
    /// transaction, so concurrent creates cannot overshoot the limit.
    pub fn insert_proof_within_quota(
        &self,
        proof: &StoredProof,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> ProofDbResult<()> {
        self.insert_with_limit(proof, Some((window_start, limit)))
    }

    fn insert_with_limit(
        &self,
        proof: &StoredProof,
        quota: Option<(DateTime<Utc>, u64)>,
    ) -> ProofDbResult<()> {
        let json = serde_json::to_vec(proof)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut user_idx = write_txn.open_table(USER_PROOF_INDEX)?;
            if let Some((window_start, limit)) = quota {
                let used = count_created_since(&user_idx, &proof.owner_user_id, window_start)?;
                if used >= limit {
                    return Err(ProofDbError::QuotaReached { used });
                }
            }

            let mut proofs = write_txn.open_table(PROOFS)?;
            if proofs.get(proof.id.as_str())?.is_some() {
                return Err(ProofDbError::AlreadyExists(format!("Proof {}", proof.id)));
            }
            proofs.insert(proof.id.as_str(), json.as_slice())?;

            let key = make_index_key(&proof.owner_user_id, proof.created_at, &proof.id);
            user_idx.insert(key.as_slice(), proof.id.as_str())?;

            let mut hash_idx = write_txn.open_table(CONTENT_HASH_INDEX)?;
            hash_idx.insert(
                hash_index_key(&proof.content_hash, &proof.id).as_str(),
                proof.id.as_str(),
            )?;

            if awaits_receipt(proof) {
                let mut pending = write_txn.open_table(PENDING_PROOFS)?;
                pending.insert(proof.id.as_str(), proof.created_at.timestamp_millis())?;
            }
            if let Some(tx_hash) = &proof.tx_hash {
                let mut tx_idx = write_txn.open_table(TX_PROOF_INDEX)?;
                tx_idx.insert(tx_hash.as_str(), proof.id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_proof(&self, proof_id: &str) -> ProofDbResult<Option<StoredProof>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROOFS)?;
        match table.get(proof_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Replace a stored proof, keeping the pending and tx indexes in step.
    ///
    /// Owner, creation time and content hash are immutable.
    pub fn update_proof(&self, proof: &StoredProof) -> ProofDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut proofs = write_txn.open_table(PROOFS)?;
            let previous: StoredProof = {
                let existing = proofs
                    .get(proof.id.as_str())?
                    .ok_or_else(|| ProofDbError::NotFound(format!("Proof {}", proof.id)))?;
                serde_json::from_slice(existing.value())?
            };

            let json = serde_json::to_vec(proof)?;
            proofs.insert(proof.id.as_str(), json.as_slice())?;

            let mut pending = write_txn.open_table(PENDING_PROOFS)?;
            if awaits_receipt(proof) {
                pending.insert(proof.id.as_str(), proof.created_at.timestamp_millis())?;
            } else {
                pending.remove(proof.id.as_str())?;
            }

            if previous.tx_hash != proof.tx_hash {
                let mut tx_idx = write_txn.open_table(TX_PROOF_INDEX)?;
                if let Some(old) = &previous.tx_hash {
                    tx_idx.remove(old.as_str())?;
                }
                if let Some(new) = &proof.tx_hash {
                    tx_idx.insert(new.as_str(), proof.id.as_str())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove a proof and its index entries.
    pub fn delete_proof(&self, proof_id: &str) -> ProofDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut proofs = write_txn.open_table(PROOFS)?;
            let proof: StoredProof = {
                let existing = proofs
                    .get(proof_id)?
                    .ok_or_else(|| ProofDbError::NotFound(format!("Proof {proof_id}")))?;
                serde_json::from_slice(existing.value())?
            };
            proofs.remove(proof_id)?;

            let mut user_idx = write_txn.open_table(USER_PROOF_INDEX)?;
            let key = make_index_key(&proof.owner_user_id, proof.created_at, &proof.id);
            user_idx.remove(key.as_slice())?;

            let mut hash_idx = write_txn.open_table(CONTENT_HASH_INDEX)?;
            hash_idx.remove(hash_index_key(&proof.content_hash, &proof.id).as_str())?;

            let mut pending = write_txn.open_table(PENDING_PROOFS)?;
            pending.remove(proof_id)?;

            if let Some(tx_hash) = &proof.tx_hash {
                let mut tx_idx = write_txn.open_table(TX_PROOF_INDEX)?;
                tx_idx.remove(tx_hash.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Page through a user's proofs, newest first.
    ///
    /// `filter` selects proofs; `total` counts every match, `items` holds at
    /// most `limit` of them after skipping `offset`.
    pub fn list_by_owner<F>(
        &self,
        owner_user_id: &str,
        offset: usize,
        limit: usize,
        filter: F,
    ) -> ProofDbResult<ProofPage>
    where
        F: Fn(&StoredProof) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(USER_PROOF_INDEX)?;
        let proofs = read_txn.open_table(PROOFS)?;

        let start = owner_prefix(owner_user_id);
        let end = owner_prefix_end(owner_user_id);

        let mut items = Vec::with_capacity(limit);
        let mut total = 0usize;
        for entry in idx_table.range(start.as_slice()..end.as_slice())? {
            let (_, proof_id) = entry?;
            let Some(value) = proofs.get(proof_id.value())? else {
                continue;
            };
            let proof: StoredProof = serde_json::from_slice(value.value())?;
            if !filter(&proof) {
                continue;
            }
            if total >= offset && items.len() < limit {
                items.push(proof);
            }
            total += 1;
        }

        Ok(ProofPage { items, total })
    }

    /// Number of a user's proofs created at or after `since`.
    pub fn count_since(&self, owner_user_id: &str, since: DateTime<Utc>) -> ProofDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(USER_PROOF_INDEX)?;
        count_created_since(&idx_table, owner_user_id, since)
    }

    /// Number of proofs a user owns.
    pub fn count_by_owner(&self, owner_user_id: &str) -> ProofDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(USER_PROOF_INDEX)?;

        let start = owner_prefix(owner_user_id);
        let end = owner_prefix_end(owner_user_id);
        let mut count = 0;
        for entry in idx_table.range(start.as_slice()..end.as_slice())? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Every proof (any owner) with the given content hash.
    pub fn find_by_hash(&self, content_hash: &str) -> ProofDbResult<Vec<StoredProof>> {
        let read_txn = self.db.begin_read()?;
        let hash_idx = read_txn.open_table(CONTENT_HASH_INDEX)?;
        let proofs = read_txn.open_table(PROOFS)?;

        let start = format!("{content_hash}|");
        let end = format!("{content_hash}}}");

        let mut found = Vec::new();
        for entry in hash_idx.range(start.as_str()..end.as_str())? {
            let (_, proof_id) = entry?;
            if let Some(value) = proofs.get(proof_id.value())? {
                found.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(found)
    }

    /// Proof anchored by a given transaction, if any.
    pub fn find_by_tx(&self, tx_hash: &str) -> ProofDbResult<Option<StoredProof>> {
        let read_txn = self.db.begin_read()?;
        let tx_idx = read_txn.open_table(TX_PROOF_INDEX)?;
        let Some(proof_id) = tx_idx.get(tx_hash)? else {
            return Ok(None);
        };
        let proofs = read_txn.open_table(PROOFS)?;
        match proofs.get(proof_id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Pending proofs with an anchoring transaction, oldest first, at most
    /// `limit`.
    pub fn pending_proofs(&self, limit: usize) -> ProofDbResult<Vec<StoredProof>> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING_PROOFS)?;
        let proofs = read_txn.open_table(PROOFS)?;

        let mut ids: Vec<(i64, String)> = Vec::new();
        for entry in pending.iter()? {
            let (id, created) = entry?;
            ids.push((created.value(), id.value().to_string()));
        }
        ids.sort();

        let mut found = Vec::new();
        for (_, id) in ids {
            if found.len() >= limit {
                break;
            }
            let Some(value) = proofs.get(id.as_str())? else {
                continue;
            };
            let proof: StoredProof = serde_json::from_slice(value.value())?;
            if awaits_receipt(&proof) {
                found.push(proof);
            }
        }
        Ok(found)
    }

    /// Move every proof of `owner_user_id` in `folder_id` to the root.
    /// Returns the number of proofs moved.
    pub fn move_folder_to_root(&self, owner_user_id: &str, folder_id: &str) -> ProofDbResult<usize> {
        let start = owner_prefix(owner_user_id);
        let end = owner_prefix_end(owner_user_id);

        let write_txn = self.db.begin_write()?;
        let moved = {
            let idx_table = write_txn.open_table(USER_PROOF_INDEX)?;
            let mut proofs = write_txn.open_table(PROOFS)?;

            let mut ids = Vec::new();
            for entry in idx_table.range(start.as_slice()..end.as_slice())? {
                let (_, proof_id) = entry?;
                ids.push(proof_id.value().to_string());
            }

            let now = Utc::now();
            let mut moved = 0;
            for id in ids {
                let bytes = match proofs.get(id.as_str())? {
                    Some(value) => value.value().to_vec(),
                    None => continue,
                };
                let mut proof: StoredProof = serde_json::from_slice(&bytes)?;
                if proof.folder_id.as_deref() != Some(folder_id) {
                    continue;
                }
                proof.folder_id = None;
                proof.updated_at = now;
                let json = serde_json::to_vec(&proof)?;
                proofs.insert(id.as_str(), json.as_slice())?;
                moved += 1;
            }
            moved
        };
        write_txn.commit()?;
        Ok(moved)
    }

    // =========================================================================
    // Subscription payments
    // =========================================================================

    /// Claim a payment transaction for a user. Returns `false` if the
    /// transaction was already applied.
    pub fn claim_payment_tx(&self, tx_hash: &str, user_id: &str) -> ProofDbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let claimed = {
            let mut table = write_txn.open_table(PAYMENT_TXS)?;
            if table.get(tx_hash)?.is_some() {
                false
            } else {
                table.insert(tx_hash, user_id)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(claimed)
    }

    /// Release a claimed payment transaction (used when applying it failed).
    pub fn release_payment_tx(&self, tx_hash: &str) -> ProofDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PAYMENT_TXS)?;
            table.remove(tx_hash)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Reconciler checkpoint
    // =========================================================================

    pub fn last_reconciled_at(&self) -> ProofDbResult<Option<DateTime<Utc>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let Some(value) = table.get(LAST_RECONCILED_KEY)? else {
            return Ok(None);
        };
        let bytes: Option<[u8; 8]> = value.value().try_into().ok();
        Ok(bytes
            .map(i64::from_be_bytes)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
    }

    pub fn set_last_reconciled_at(&self, at: DateTime<Utc>) -> ProofDbResult<()> {
        let bytes = at.timestamp_millis().to_be_bytes();
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(META)?;
            table.insert(LAST_RECONCILED_KEY, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// One page of a proof listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofPage {
    pub items: Vec<StoredProof>,
    pub total: usize,
}
