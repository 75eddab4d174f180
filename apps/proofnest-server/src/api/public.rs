// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Shareable proof page. Anyone with the id can see the anchor metadata;
//! the content itself is never exposed.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::OptionalAuth,
    blockchain::network_from_key,
    error::ApiError,
    hashing::short_address,
    state::AppState,
    storage::ProofStatus,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProofResponse {
    pub id: String,
    pub content_hash: String,
    pub chain: String,
    pub network_name: Option<String>,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub status: ProofStatus,
    pub block_number: Option<u64>,
    pub anchored_by: Option<String>,
    /// `0x1234...abcd`
    pub anchored_by_short: Option<String>,
    pub anchored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Whether the signed-in viewer owns the proof
    pub viewer_is_owner: bool,
}

#[utoipa::path(
    get,
    path = "/v1/public/proofs/{id}",
    tag = "Public",
    params(("id" = String, Path, description = "Proof id")),
    responses(
        (status = 200, description = "Public proof metadata", body = PublicProofResponse),
        (status = 404, description = "Proof not found")
    )
)]
pub async fn get_public_proof(
    OptionalAuth(viewer): OptionalAuth,
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
) -> Result<Json<PublicProofResponse>, ApiError> {
    let proof = state
        .proofs
        .get_proof(&proof_id)?
        .ok_or_else(|| ApiError::not_found(format!("Proof {proof_id} not found")))?;

    let network = network_from_key(&proof.chain).ok();
    let explorer_url = match (&proof.tx_hash, &network) {
        (Some(tx), Some(network)) => network.explorer_tx_url(tx),
        _ => None,
    };
    let viewer_is_owner = viewer.is_some_and(|user| user.user_id == proof.owner_user_id);

    Ok(Json(PublicProofResponse {
        network_name: network.map(|n| n.name.to_string()),
        explorer_url,
        anchored_by_short: proof.anchored_by.as_deref().map(short_address),
        viewer_is_owner,
        id: proof.id,
        content_hash: proof.content_hash,
        chain: proof.chain,
        tx_hash: proof.tx_hash,
        status: proof.status,
        block_number: proof.block_number,
        anchored_by: proof.anchored_by,
        anchored_at: proof.anchored_at,
        created_at: proof.created_at,
    }))
}
