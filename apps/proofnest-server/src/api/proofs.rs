// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Proof endpoints.
//!
//! A proof is created `pending`. It gets an anchoring transaction in one of
//! three ways:
//!
//! - `anchor: true`: the server relay submits `addProof`
//! - `tx_hash`: the user's wallet already submitted `addProof`
//! - later, through `POST /v1/proofs/{id}/anchor`
//!
//! The reconciler then moves it to `confirmed` or `failed`.

use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{Auth, AuthenticatedUser},
    blockchain::{canonical_tx_hash, network_from_key},
    error::ApiError,
    hashing::{digest_to_bytes32, hash_content, normalize_content},
    quota,
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, FolderRepository, NoteRepository, OwnershipEnforcer,
        ProofDbError, ProofStatus, StoredNote, StoredProof, SubscriptionRepository,
    },
};

use super::record_audit;

/// Largest accepted content after normalization.
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const RECENT_PROOFS: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProofRequest {
    pub content: String,
    pub folder_id: Option<String>,
    /// Submit `addProof` through the server relay
    #[serde(default)]
    pub anchor: bool,
    /// Transaction already submitted from the user's wallet
    pub tx_hash: Option<String>,
}

/// Owner view of a proof.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProofView {
    pub id: String,
    pub content_hash: String,
    pub chain: String,
    pub status: ProofStatus,
    pub tx_hash: Option<String>,
    pub folder_id: Option<String>,
    pub block_number: Option<u64>,
    pub anchored_by: Option<String>,
    pub anchored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub explorer_url: Option<String>,
    pub share_url: Option<String>,
    /// Only on single-proof responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ProofView {
    pub fn new(proof: StoredProof, state: &AppState, content: Option<String>) -> Self {
        let explorer_url = match (&proof.tx_hash, network_from_key(&proof.chain)) {
            (Some(tx), Ok(network)) => network.explorer_tx_url(tx),
            _ => None,
        };
        Self {
            share_url: state.share_url(&proof.id),
            explorer_url,
            content,
            id: proof.id,
            content_hash: proof.content_hash,
            chain: proof.chain,
            status: proof.status,
            tx_hash: proof.tx_hash,
            folder_id: proof.folder_id,
            block_number: proof.block_number,
            anchored_by: proof.anchored_by,
            anchored_at: proof.anchored_at,
            created_at: proof.created_at,
            updated_at: proof.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProofsQuery {
    /// Only proofs in this folder
    pub folder_id: Option<String>,
    /// Only proofs outside any folder
    pub root: Option<bool>,
    pub status: Option<ProofStatus>,
    /// Digest prefix or content substring
    pub search: Option<String>,
    /// Page size (default 50, max 200)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProofListResponse {
    pub items: Vec<ProofView>,
    /// Matches before paging
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveProofRequest {
    /// Target folder; `null` moves the proof to the root
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachAnchorRequest {
    pub tx_hash: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn load_owned_proof(
    state: &AppState,
    proof_id: &str,
    user: &AuthenticatedUser,
) -> Result<StoredProof, ApiError> {
    let proof = state
        .proofs
        .get_proof(proof_id)?
        .ok_or_else(|| ApiError::not_found(format!("Proof {proof_id} not found")))?;
    proof.verify_ownership(user)?;
    Ok(proof)
}

/// Refuse a tx hash that already backs a different proof.
fn ensure_tx_unclaimed(state: &AppState, tx_hash: &str, proof_id: Option<&str>) -> Result<(), ApiError> {
    match state.proofs.find_by_tx(tx_hash)? {
        Some(existing) if Some(existing.id.as_str()) != proof_id => Err(ApiError::conflict(
            "Transaction is already linked to another proof",
        )),
        _ => Ok(()),
    }
}

fn search_filter(
    state: &AppState,
    user_id: &str,
    search: Option<&str>,
) -> Result<Option<(String, HashSet<String>)>, ApiError> {
    let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let prefix = needle
        .strip_prefix("0x")
        .unwrap_or(needle)
        .to_ascii_lowercase();
    let note_ids = NoteRepository::new(state.storage())
        .search_ids(user_id, needle)?
        .into_iter()
        .collect();
    Ok(Some((prefix, note_ids)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a proof.
///
/// Normalizes and fingerprints the content, enforces the monthly quota and
/// stores the note and proof. See the module docs for anchoring modes.
#[utoipa::path(
    post,
    path = "/v1/proofs",
    tag = "Proofs",
    request_body = CreateProofRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Proof created", body = ProofView),
        (status = 400, description = "Invalid content or transaction hash"),
        (status = 401, description = "Not authenticated"),
        (status = 402, description = "Monthly quota exceeded"),
        (status = 404, description = "Folder not found"),
        (status = 409, description = "Already anchored on-chain or transaction reused"),
        (status = 413, description = "Content too large"),
        (status = 503, description = "No relay signer configured")
    )
)]
pub async fn create_proof(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateProofRequest>,
) -> Result<(StatusCode, Json<ProofView>), ApiError> {
    let content = normalize_content(&request.content);
    if content.is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(ApiError::payload_too_large("Content exceeds 1 MiB"));
    }
    if request.anchor && request.tx_hash.is_some() {
        return Err(ApiError::bad_request(
            "Use either anchor or tx_hash, not both",
        ));
    }

    let tx_hash = match request.tx_hash.as_deref() {
        Some(raw) => {
            let tx = canonical_tx_hash(raw)
                .ok_or_else(|| ApiError::bad_request("Invalid transaction hash"))?;
            ensure_tx_unclaimed(&state, &tx, None)?;
            Some(tx)
        }
        None => None,
    };

    let folder_id = match request.folder_id.filter(|f| !f.is_empty()) {
        Some(folder_id) => {
            FolderRepository::new(state.storage()).get_owned(&folder_id, &user.user_id)?;
            Some(folder_id)
        }
        None => None,
    };

    let now = Utc::now();
    let subscription = SubscriptionRepository::new(state.storage()).get(&user.user_id)?;
    let plan = quota::effective_plan(subscription.as_ref(), now);
    let used = state
        .proofs
        .count_since(&user.user_id, quota::month_start(now))?;
    quota::check(plan, used, now)?;

    let content_hash = hash_content(&content);
    let digest = digest_to_bytes32(&content_hash)
        .ok_or_else(|| ApiError::internal("Fingerprint is not a 32-byte digest"))?;

    if request.anchor {
        if !state.ledger.can_submit() {
            return Err(crate::blockchain::LedgerError::ReadOnly.into());
        }
        if state.ledger.proof_record(digest).await?.is_some() {
            return Err(ApiError::conflict("This content is already anchored on-chain"));
        }
    } else if tx_hash.is_none() {
        match state.ledger.proof_record(digest).await {
            Ok(Some(_)) => {
                return Err(ApiError::conflict("This content is already anchored on-chain"))
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "On-chain duplicate check skipped"),
        }
    }

    let notes = NoteRepository::new(state.storage());
    let note = StoredNote::new(&user.user_id, content, content_hash.clone());
    notes.create(&note)?;
    let discard_note = || {
        if let Err(e) = notes.delete(&note.id) {
            tracing::warn!(note_id = %note.id, error = %e, "Failed to remove orphaned note");
        }
    };

    let mut proof = StoredProof::new_pending(
        &user.user_id,
        &note.id,
        &content_hash,
        state.ledger.network().key,
        folder_id,
    );
    if let Some(tx) = tx_hash {
        proof.attach_tx(tx);
    }
    if let Err(e) = state.proofs.insert_proof_within_quota(
        &proof,
        quota::month_start(now),
        plan.monthly_limit(),
    ) {
        discard_note();
        return Err(match e {
            ProofDbError::QuotaReached { used } => match quota::check(plan, used, now) {
                Err(exceeded) => exceeded.into(),
                Ok(_) => ApiError::internal("Quota check disagreed with the database"),
            },
            other => other.into(),
        });
    }

    // The proof row must exist before the relay anchors its digest.
    if request.anchor {
        let relayed = match state.ledger.add_proof(digest).await {
            Ok(tx) => tx,
            Err(e) => {
                if let Err(cleanup) = state.proofs.delete_proof(&proof.id) {
                    tracing::warn!(proof_id = %proof.id, error = %cleanup, "Failed to remove unanchored proof");
                }
                discard_note();
                return Err(e.into());
            }
        };
        proof.attach_tx(relayed);
        if let Err(e) = state.proofs.update_proof(&proof) {
            tracing::warn!(
                proof_id = %proof.id,
                tx_hash = ?proof.tx_hash,
                error = %e,
                "Relayed addProof but could not record the transaction on the proof"
            );
            return Err(e.into());
        }
    }
    state.cache.invalidate(&user.user_id);

    tracing::info!(
        proof_id = %proof.id,
        user_id = %user.user_id,
        content_hash = %proof.content_hash,
        relayed = request.anchor,
        tx_hash = ?proof.tx_hash,
        "Proof created"
    );
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::ProofCreated)
            .with_user(&user.user_id)
            .with_resource("proof", &proof.id)
            .with_details(serde_json::json!({
                "content_hash": proof.content_hash,
                "tx_hash": proof.tx_hash,
                "relayed": request.anchor,
                "plan": plan.name(),
            })),
    );

    let content = Some(note.content);
    Ok((StatusCode::CREATED, Json(ProofView::new(proof, &state, content))))
}

/// List the caller's proofs, newest first.
#[utoipa::path(
    get,
    path = "/v1/proofs",
    tag = "Proofs",
    params(ListProofsQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Page of proofs", body = ProofListResponse),
        (status = 400, description = "Conflicting filters"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_proofs(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ListProofsQuery>,
) -> Result<Json<ProofListResponse>, ApiError> {
    let root_only = query.root.unwrap_or(false);
    if root_only && query.folder_id.is_some() {
        return Err(ApiError::bad_request("Use either folder_id or root, not both"));
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    let search = search_filter(&state, &user.user_id, query.search.as_deref())?;

    let page = state.proofs.list_by_owner(&user.user_id, offset, limit, |proof| {
        if root_only && proof.folder_id.is_some() {
            return false;
        }
        if let Some(folder) = &query.folder_id {
            if proof.folder_id.as_ref() != Some(folder) {
                return false;
            }
        }
        if let Some(status) = query.status {
            if proof.status != status {
                return false;
            }
        }
        match &search {
            Some((prefix, note_ids)) => {
                proof.content_hash.starts_with(prefix.as_str()) || note_ids.contains(&proof.note_id)
            }
            None => true,
        }
    })?;

    let items = page
        .items
        .into_iter()
        .map(|proof| ProofView::new(proof, &state, None))
        .collect();

    Ok(Json(ProofListResponse {
        items,
        total: page.total,
        limit,
        offset,
    }))
}

/// The caller's ten newest proofs.
#[utoipa::path(
    get,
    path = "/v1/proofs/recent",
    tag = "Proofs",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recent proofs", body = [ProofView]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn recent_proofs(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProofView>>, ApiError> {
    let proofs = match state.cache.get_recent(&user.user_id) {
        Some(cached) => cached,
        None => {
            let page = state
                .proofs
                .list_by_owner(&user.user_id, 0, RECENT_PROOFS, |_| true)?;
            state.cache.put_recent(&user.user_id, page.items.clone());
            page.items
        }
    };

    Ok(Json(
        proofs
            .into_iter()
            .map(|proof| ProofView::new(proof, &state, None))
            .collect(),
    ))
}

/// Get one of the caller's proofs, including its content.
#[utoipa::path(
    get,
    path = "/v1/proofs/{id}",
    tag = "Proofs",
    params(("id" = String, Path, description = "Proof id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Proof", body = ProofView),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Proof not found")
    )
)]
pub async fn get_proof(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
) -> Result<Json<ProofView>, ApiError> {
    let proof = load_owned_proof(&state, &proof_id, &user)?;
    let content = match NoteRepository::new(state.storage()).get(&proof.note_id) {
        Ok(note) => Some(note.content),
        Err(e) => {
            tracing::warn!(proof_id = %proof.id, error = %e, "Proof note unavailable");
            None
        }
    };
    Ok(Json(ProofView::new(proof, &state, content)))
}

/// Move a proof into a folder, or to the root with `folder_id: null`.
#[utoipa::path(
    put,
    path = "/v1/proofs/{id}/folder",
    tag = "Proofs",
    params(("id" = String, Path, description = "Proof id")),
    request_body = MoveProofRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Proof moved", body = ProofView),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Proof or folder not found")
    )
)]
pub async fn move_proof(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
    Json(request): Json<MoveProofRequest>,
) -> Result<Json<ProofView>, ApiError> {
    let mut proof = load_owned_proof(&state, &proof_id, &user)?;

    let folder_id = request.folder_id.filter(|f| !f.is_empty());
    if let Some(folder_id) = &folder_id {
        FolderRepository::new(state.storage()).get_owned(folder_id, &user.user_id)?;
    }

    if proof.folder_id != folder_id {
        proof.folder_id = folder_id;
        proof.updated_at = Utc::now();
        state.proofs.update_proof(&proof)?;
        state.cache.invalidate(&user.user_id);

        record_audit(
            &state,
            AuditEvent::new(AuditEventType::ProofMoved)
                .with_user(&user.user_id)
                .with_resource("proof", &proof.id)
                .with_details(serde_json::json!({ "folder_id": proof.folder_id })),
        );
    }

    Ok(Json(ProofView::new(proof, &state, None)))
}

/// Attach a wallet-submitted `addProof` transaction to a proof.
///
/// Allowed while the proof is pending or failed; a failed proof goes back
/// to pending.
#[utoipa::path(
    post,
    path = "/v1/proofs/{id}/anchor",
    tag = "Proofs",
    params(("id" = String, Path, description = "Proof id")),
    request_body = AttachAnchorRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transaction attached", body = ProofView),
        (status = 400, description = "Invalid transaction hash"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Proof not found"),
        (status = 409, description = "Proof already confirmed or transaction reused")
    )
)]
pub async fn attach_anchor(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
    Json(request): Json<AttachAnchorRequest>,
) -> Result<Json<ProofView>, ApiError> {
    let mut proof = load_owned_proof(&state, &proof_id, &user)?;
    if proof.status == ProofStatus::Confirmed {
        return Err(ApiError::conflict("Proof is already confirmed"));
    }

    let tx_hash = canonical_tx_hash(&request.tx_hash)
        .ok_or_else(|| ApiError::bad_request("Invalid transaction hash"))?;
    ensure_tx_unclaimed(&state, &tx_hash, Some(&proof.id))?;

    if proof.tx_hash.as_deref() != Some(tx_hash.as_str()) || proof.status == ProofStatus::Failed {
        proof.attach_tx(tx_hash.clone());
        state.proofs.update_proof(&proof)?;
        state.cache.invalidate(&user.user_id);

        tracing::info!(proof_id = %proof.id, tx_hash = %tx_hash, "Anchor transaction attached");
        record_audit(
            &state,
            AuditEvent::new(AuditEventType::ProofAnchorSubmitted)
                .with_user(&user.user_id)
                .with_resource("proof", &proof.id)
                .with_details(serde_json::json!({ "tx_hash": tx_hash })),
        );
    }

    Ok(Json(ProofView::new(proof, &state, None)))
}
