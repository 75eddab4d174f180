// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Public fingerprinting endpoints. Nothing is stored.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    hashing::{
        canonical_digest, digest_to_bytes32, hash_content as sha256_hex, normalize_content,
        verify_content as content_matches,
    },
    state::AppState,
    storage::ProofStatus,
};

use super::proofs::MAX_CONTENT_BYTES;

#[derive(Debug, Deserialize, ToSchema)]
pub struct HashRequest {
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HashResponse {
    /// SHA-256 of the normalized content, 64 lowercase hex chars
    pub content_hash: String,
    pub algorithm: String,
    /// Bytes hashed after normalization
    pub normalized_length: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub content: String,
    /// Digest to compare against, e.g. from a share page
    pub content_hash: Option<String>,
}

/// What the contract recorded for a digest.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnChainRecord {
    pub owner: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub content_hash: String,
    /// Present when a digest was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<bool>,
    /// Whether any proof exists for the digest
    pub proof_exists: bool,
    /// Public ids of confirmed proofs for the digest
    pub confirmed_proof_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_chain: Option<OnChainRecord>,
}

fn normalized(content: &str) -> Result<String, ApiError> {
    let normalized = normalize_content(content);
    if normalized.len() > MAX_CONTENT_BYTES {
        return Err(ApiError::payload_too_large("Content exceeds 1 MiB"));
    }
    Ok(normalized)
}

/// Fingerprint content.
///
/// Whitespace-only content has an empty fingerprint.
#[utoipa::path(
    post,
    path = "/v1/hash",
    tag = "Hashing",
    request_body = HashRequest,
    responses(
        (status = 200, description = "Fingerprint", body = HashResponse),
        (status = 413, description = "Content too large")
    )
)]
pub async fn hash_content(Json(request): Json<HashRequest>) -> Result<Json<HashResponse>, ApiError> {
    let normalized = normalized(&request.content)?;
    Ok(Json(HashResponse {
        content_hash: sha256_hex(&normalized),
        algorithm: "sha256".to_string(),
        normalized_length: normalized.len(),
    }))
}

/// Verify content against a digest and look the digest up.
///
/// Reports only whether proofs exist; content and owners stay private.
#[utoipa::path(
    post,
    path = "/v1/verify",
    tag = "Hashing",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 400, description = "Empty content or malformed digest"),
        (status = 413, description = "Content too large")
    )
)]
pub async fn verify_content(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let normalized = normalized(&request.content)?;
    if normalized.is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    let content_hash = sha256_hex(&normalized);

    let matches = match request.content_hash.as_deref() {
        Some(raw) => {
            if canonical_digest(raw).is_none() {
                return Err(ApiError::bad_request("content_hash must be 64 hex characters"));
            }
            Some(content_matches(&request.content, raw))
        }
        None => None,
    };

    let proofs = state.proofs.find_by_hash(&content_hash)?;
    let confirmed_proof_ids = proofs
        .iter()
        .filter(|p| p.status == ProofStatus::Confirmed)
        .map(|p| p.id.clone())
        .collect();

    let on_chain = match digest_to_bytes32(&content_hash) {
        Some(digest) => match state.ledger.proof_record(digest).await {
            Ok(record) => record.map(|r| OnChainRecord {
                owner: r.owner_hex(),
                timestamp: r.timestamp_utc(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "On-chain lookup failed during verification");
                None
            }
        },
        None => None,
    };

    Ok(Json(VerifyResponse {
        content_hash,
        matches,
        proof_exists: !proofs.is_empty() || on_chain.is_some(),
        confirmed_proof_ids,
        on_chain,
    }))
}
