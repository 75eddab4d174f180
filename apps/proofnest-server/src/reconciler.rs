// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! # Proof Reconciler
//!
//! Background task that brings off-chain proof status in line with the
//! chain. Every `interval` (default 15 s) it loads pending proofs that carry
//! an anchoring transaction and asks the ledger for each receipt:
//!
//! | receipt                                      | new status  |
//! |----------------------------------------------|-------------|
//! | none yet                                     | `pending`   |
//! | reverted                                     | `failed`    |
//! | success, `ProofAdded` for the proof's digest | `confirmed` |
//! | success, no matching `ProofAdded`            | `failed`    |
//!
//! Only the transaction that emitted `ProofAdded` for the digest confirms a
//! proof; any other successful transaction leaves it `failed`.
//!
//! Ledger errors leave the proof untouched for the next sweep.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::blockchain::{LedgerError, ProofLedger};
use crate::hashing::digest_to_bytes32;
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, DocumentStore, ProofCache, ProofDatabase,
    ProofStatus, StoredProof,
};

/// Default interval between sweeps.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

/// Maximum proofs examined per sweep.
const SWEEP_BATCH: usize = 200;

/// Result of reconciling one proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    StillPending,
    Confirmed,
    Failed,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    /// Pending proofs with a transaction hash that were examined
    pub checked: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub still_pending: usize,
    /// Proofs skipped because the ledger or database returned an error
    pub errors: usize,
}

/// Decide the new status of `proof` from the receipt of its anchoring
/// transaction, updating it in place.
pub async fn reconcile_proof(
    ledger: &dyn ProofLedger,
    proof: &mut StoredProof,
) -> Result<ReconcileOutcome, LedgerError> {
    let Some(tx_hash) = proof.tx_hash.clone() else {
        return Ok(ReconcileOutcome::StillPending);
    };

    let Some(receipt) = ledger.transaction_receipt(&tx_hash).await? else {
        return Ok(ReconcileOutcome::StillPending);
    };

    if !receipt.success {
        proof.mark_failed(Some(receipt.block_number));
        return Ok(ReconcileOutcome::Failed);
    }

    let Some(digest) = digest_to_bytes32(&proof.content_hash) else {
        proof.mark_failed(Some(receipt.block_number));
        return Ok(ReconcileOutcome::Failed);
    };

    match receipt.proof_added(digest) {
        Some(record) => {
            proof.mark_confirmed(receipt.block_number, &record);
            Ok(ReconcileOutcome::Confirmed)
        }
        None => {
            proof.mark_failed(Some(receipt.block_number));
            Ok(ReconcileOutcome::Failed)
        }
    }
}

/// Periodic reconciliation of pending proofs.
#[derive(Clone)]
pub struct Reconciler {
    storage: Arc<DocumentStore>,
    proofs: Arc<ProofDatabase>,
    cache: Arc<ProofCache>,
    ledger: Arc<dyn ProofLedger>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        storage: Arc<DocumentStore>,
        proofs: Arc<ProofDatabase>,
        cache: Arc<ProofCache>,
        ledger: Arc<dyn ProofLedger>,
    ) -> Self {
        Self {
            storage,
            proofs,
            cache,
            ledger,
            interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reconciler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            network = self.ledger.network().key,
            "Proof reconciler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let report = self.sweep().await;
            if report.checked > 0 {
                info!(
                    checked = report.checked,
                    confirmed = report.confirmed,
                    failed = report.failed,
                    still_pending = report.still_pending,
                    errors = report.errors,
                    "Reconciliation sweep complete"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Proof reconciler shutting down");
    }

    /// Execute one sweep over pending proofs.
    pub async fn sweep(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let pending = match self.proofs.pending_proofs(SWEEP_BATCH) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Reconciler: failed to list pending proofs");
                report.errors += 1;
                return report;
            }
        };

        for mut proof in pending {
            report.checked += 1;

            let outcome = match reconcile_proof(self.ledger.as_ref(), &mut proof).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(proof_id = %proof.id, error = %e, "Reconciler: ledger lookup failed");
                    report.errors += 1;
                    continue;
                }
            };

            if outcome == ReconcileOutcome::StillPending {
                debug!(proof_id = %proof.id, "Reconciler: receipt not available yet");
                report.still_pending += 1;
                continue;
            }

            if let Err(e) = self.proofs.update_proof(&proof) {
                warn!(proof_id = %proof.id, error = %e, "Reconciler: failed to persist status");
                report.errors += 1;
                continue;
            }
            self.cache.invalidate(&proof.owner_user_id);
            self.audit(&proof);

            match proof.status {
                ProofStatus::Confirmed => report.confirmed += 1,
                ProofStatus::Failed => report.failed += 1,
                ProofStatus::Pending => report.still_pending += 1,
            }
        }

        if let Err(e) = self.proofs.set_last_reconciled_at(Utc::now()) {
            warn!(error = %e, "Reconciler: failed to store checkpoint");
        }
        report
    }

    fn audit(&self, proof: &StoredProof) {
        let event_type = match proof.status {
            ProofStatus::Confirmed => AuditEventType::ProofConfirmed,
            _ => AuditEventType::ProofFailed,
        };
        let event = AuditEvent::new(event_type)
            .with_user(&proof.owner_user_id)
            .with_resource("proof", &proof.id)
            .with_details(serde_json::json!({
                "tx_hash": proof.tx_hash,
                "block_number": proof.block_number,
            }));
        if let Err(e) = AuditRepository::new(&self.storage).log(&event) {
            warn!(error = %e, "Failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::local::LOCAL_RELAY_ADDRESS;
    use crate::blockchain::LocalLedger;
    use crate::hashing::fingerprint;
    use crate::storage::StoragePaths;
    use alloy::primitives::Address;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        ledger: Arc<LocalLedger>,
        proofs: Arc<ProofDatabase>,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let mut storage = DocumentStore::new(paths.clone());
        storage.initialize().unwrap();
        let proofs = Arc::new(ProofDatabase::open(&paths.proofs_db()).unwrap());
        let ledger = Arc::new(LocalLedger::new());
        let reconciler = Reconciler::new(
            Arc::new(storage),
            proofs.clone(),
            Arc::new(ProofCache::new(16, Duration::from_secs(60))),
            ledger.clone(),
        );
        Fixture {
            _temp: temp,
            ledger,
            proofs,
            reconciler,
        }
    }

    fn pending_proof(content: &str) -> StoredProof {
        StoredProof::new_pending("user-1", "note-1", &fingerprint(content), "local", None)
    }

    #[tokio::test]
    async fn proof_without_receipt_stays_pending() {
        let ledger = LocalLedger::new();
        let mut proof = pending_proof("x");
        proof.attach_tx(format!("0x{}", "12".repeat(32)));
        assert_eq!(
            reconcile_proof(&ledger, &mut proof).await.unwrap(),
            ReconcileOutcome::StillPending
        );
        assert_eq!(proof.status, ProofStatus::Pending);
    }

    #[tokio::test]
    async fn successful_anchor_is_confirmed() {
        let ledger = LocalLedger::new();
        let mut proof = pending_proof("confirmed content");
        let digest = digest_to_bytes32(&proof.content_hash).unwrap();
        let tx = ledger.add_proof(digest).await.unwrap();
        proof.attach_tx(tx);

        assert_eq!(
            reconcile_proof(&ledger, &mut proof).await.unwrap(),
            ReconcileOutcome::Confirmed
        );
        assert_eq!(proof.block_number, Some(1));
        assert_eq!(proof.anchored_by, Some(format!("{:?}", LOCAL_RELAY_ADDRESS)));
        assert!(proof.anchored_at.is_some());
    }

    #[tokio::test]
    async fn reverted_anchor_fails() {
        let ledger = LocalLedger::read_only();
        let wallet = Address::repeat_byte(0x33);
        let mut proof = pending_proof("twice");
        let digest = digest_to_bytes32(&proof.content_hash).unwrap();

        ledger.submit_add_proof(wallet, digest).unwrap();
        let dup = ledger.submit_add_proof(wallet, digest).unwrap();
        proof.attach_tx(dup);

        assert_eq!(
            reconcile_proof(&ledger, &mut proof).await.unwrap(),
            ReconcileOutcome::Failed
        );
        assert_eq!(proof.status, ProofStatus::Failed);
    }

    #[tokio::test]
    async fn successful_tx_for_other_digest_fails() {
        let ledger = LocalLedger::new();
        let other = digest_to_bytes32(&fingerprint("something else")).unwrap();
        let tx = ledger.add_proof(other).await.unwrap();

        let mut proof = pending_proof("never anchored");
        proof.attach_tx(tx);
        assert_eq!(
            reconcile_proof(&ledger, &mut proof).await.unwrap(),
            ReconcileOutcome::Failed
        );
    }

    #[tokio::test]
    async fn sweep_updates_database() {
        let fx = fixture();

        let mut anchored = pending_proof("anchored");
        let digest = digest_to_bytes32(&anchored.content_hash).unwrap();
        anchored.attach_tx(fx.ledger.add_proof(digest).await.unwrap());
        fx.proofs.insert_proof(&anchored).unwrap();

        let mut waiting = pending_proof("waiting");
        waiting.attach_tx(format!("0x{}", "ee".repeat(32)));
        fx.proofs.insert_proof(&waiting).unwrap();

        // No tx hash: not examined.
        let draft = pending_proof("draft");
        fx.proofs.insert_proof(&draft).unwrap();

        let report = fx.reconciler.sweep().await;
        assert_eq!(
            report,
            ReconcileReport {
                checked: 2,
                confirmed: 1,
                failed: 0,
                still_pending: 1,
                errors: 0,
            }
        );

        let stored = fx.proofs.get_proof(&anchored.id).unwrap().unwrap();
        assert_eq!(stored.status, ProofStatus::Confirmed);
        assert_eq!(fx.proofs.pending_proofs(10).unwrap().len(), 1);
        assert_eq!(
            fx.proofs.get_proof(&draft.id).unwrap().unwrap().status,
            ProofStatus::Pending
        );
        assert!(fx.proofs.last_reconciled_at().unwrap().is_some());
    }

    #[tokio::test]
    async fn unrelated_tx_does_not_confirm_digest_anchored_by_someone_else() {
        let ledger = LocalLedger::read_only();
        let mut proof = pending_proof("famous quote");
        let digest = digest_to_bytes32(&proof.content_hash).unwrap();

        // A third party anchors the same content.
        ledger
            .submit_add_proof(Address::repeat_byte(0x99), digest)
            .unwrap();
        // The owner attaches an unrelated successful transaction.
        let unrelated = ledger
            .submit_add_proof(Address::repeat_byte(0x44), alloy::primitives::B256::repeat_byte(0x01))
            .unwrap();
        proof.attach_tx(unrelated);

        assert_eq!(
            reconcile_proof(&ledger, &mut proof).await.unwrap(),
            ReconcileOutcome::Failed
        );
        assert_eq!(proof.status, ProofStatus::Failed);
        assert!(proof.anchored_by.is_none());
    }

    #[tokio::test]
    async fn drafts_do_not_starve_anchored_proofs() {
        let fx = fixture();
        let base = chrono::Utc::now() - chrono::Duration::hours(1);
        for i in 0..(SWEEP_BATCH as i64 + 5) {
            let mut draft = pending_proof(&format!("draft {i}"));
            draft.created_at = base + chrono::Duration::milliseconds(i);
            fx.proofs.insert_proof(&draft).unwrap();
        }

        let mut anchored = pending_proof("anchored after the backlog");
        let digest = digest_to_bytes32(&anchored.content_hash).unwrap();
        anchored.attach_tx(fx.ledger.add_proof(digest).await.unwrap());
        fx.proofs.insert_proof(&anchored).unwrap();

        let report = fx.reconciler.sweep().await;
        assert_eq!(report.checked, 1);
        assert_eq!(report.confirmed, 1);
        assert_eq!(
            fx.proofs.get_proof(&anchored.id).unwrap().unwrap().status,
            ProofStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let fx = fixture();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            fx.reconciler
                .clone()
                .with_interval(Duration::from_millis(10))
                .run(shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reconciler did not stop")
            .unwrap();
    }
}
