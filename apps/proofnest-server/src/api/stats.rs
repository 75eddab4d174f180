// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    quota::{self, QuotaStatus},
    state::AppState,
    storage::{FolderRepository, ProofStatus, SubscriptionRepository},
};

/// Dashboard counters for the caller.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_proofs: u64,
    pub total_folders: usize,
    pub proofs_this_month: u64,
    pub confirmed_proofs: usize,
    pub pending_proofs: usize,
}

/// Monthly quota usage under the caller's current plan.
#[utoipa::path(
    get,
    path = "/v1/usage",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Quota usage", body = QuotaStatus),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_usage(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<QuotaStatus>, ApiError> {
    let now = Utc::now();
    let subscription = SubscriptionRepository::new(state.storage()).get(&user.user_id)?;
    let plan = quota::effective_plan(subscription.as_ref(), now);
    let used = state
        .proofs
        .count_since(&user.user_id, quota::month_start(now))?;
    Ok(Json(quota::status(plan, used, now)))
}

#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = StatsResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_stats(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    let count_status = |status: ProofStatus| {
        state
            .proofs
            .list_by_owner(&user.user_id, 0, 0, |p| p.status == status)
            .map(|page| page.total)
    };

    Ok(Json(StatsResponse {
        total_proofs: state.proofs.count_by_owner(&user.user_id)?,
        total_folders: FolderRepository::new(state.storage())
            .list_by_owner(&user.user_id)?
            .len(),
        proofs_this_month: state
            .proofs
            .count_since(&user.user_id, quota::month_start(Utc::now()))?,
        confirmed_proofs: count_status(ProofStatus::Confirmed)?,
        pending_proofs: count_status(ProofStatus::Pending)?,
    }))
}
