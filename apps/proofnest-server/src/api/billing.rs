// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Plans and on-chain subscription payments.
//!
//! The user's wallet calls `subscribe(planId, isAnnual)` with the plan price.
//! The client then posts the transaction hash here. The subscription is
//! recorded off-chain only when the receipt carries a `Subscribed` event from
//! the contract for the requested plan and billing period (and, if given,
//! the requested wallet). Each payment transaction can be applied once.

use std::str::FromStr;

use alloy::primitives::Address;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    blockchain::canonical_tx_hash,
    error::ApiError,
    quota::{self, Plan},
    state::AppState,
    storage::{AuditEvent, AuditEventType, StoredSubscription, SubscriptionRepository},
};

use super::record_audit;

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanInfo {
    pub id: Plan,
    pub plan_id: u64,
    pub name: String,
    pub monthly_limit: u64,
    pub monthly_price_usd: u32,
    /// Effective monthly price when billed annually
    pub annual_monthly_price_usd: u32,
    /// On-chain monthly price in wei, decimal string
    pub price_wei_monthly: Option<String>,
    /// On-chain annual price in wei, decimal string
    pub price_wei_annual: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlansResponse {
    pub plans: Vec<PlanInfo>,
    pub network: String,
    pub chain_id: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    /// Plan in effect right now
    pub plan: Plan,
    pub subscription: Option<StoredSubscription>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub tx_hash: String,
    pub plan_id: u64,
    #[serde(default)]
    pub is_annual: bool,
    /// Wallet that sent the payment
    pub wallet_address: Option<String>,
}

async fn wei_price(state: &AppState, plan: Plan, is_annual: bool) -> Option<String> {
    match state.ledger.plan_price(plan.id(), is_annual).await {
        Ok(price) => Some(price.to_string()),
        Err(e) => {
            tracing::warn!(plan = plan.name(), is_annual, error = %e, "Plan price unavailable");
            None
        }
    }
}

/// List plans with their on-chain prices.
#[utoipa::path(
    get,
    path = "/v1/billing/plans",
    tag = "Billing",
    responses(
        (status = 200, description = "Available plans", body = PlansResponse)
    )
)]
pub async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    let mut plans = Vec::with_capacity(Plan::ALL.len());
    for plan in Plan::ALL {
        let (price_wei_monthly, price_wei_annual) = if plan.is_paid() {
            (
                wei_price(&state, plan, false).await,
                wei_price(&state, plan, true).await,
            )
        } else {
            (None, None)
        };
        plans.push(PlanInfo {
            id: plan,
            plan_id: plan.id(),
            name: plan.name().to_string(),
            monthly_limit: plan.monthly_limit(),
            monthly_price_usd: plan.monthly_price_usd(),
            annual_monthly_price_usd: plan.annual_monthly_price_usd(),
            price_wei_monthly,
            price_wei_annual,
        });
    }

    let network = state.ledger.network();
    Json(PlansResponse {
        plans,
        network: network.key.to_string(),
        chain_id: network.chain_id,
    })
}

#[utoipa::path(
    get,
    path = "/v1/billing/subscription",
    tag = "Billing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current plan and subscription", body = SubscriptionResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_subscription(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = SubscriptionRepository::new(state.storage()).get(&user.user_id)?;
    let plan = quota::effective_plan(subscription.as_ref(), Utc::now());
    Ok(Json(SubscriptionResponse { plan, subscription }))
}

/// Verify a `subscribe` payment and activate the plan.
///
/// Waits for the receipt up to the configured timeout. A still-active
/// subscription is extended from its current expiry.
#[utoipa::path(
    post,
    path = "/v1/billing/verify",
    tag = "Billing",
    request_body = VerifyPaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription activated", body = StoredSubscription),
        (status = 400, description = "Invalid plan, transaction or failed payment"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Payment transaction already used"),
        (status = 502, description = "Blockchain node error"),
        (status = 504, description = "Receipt not found in time")
    )
)]
pub async fn verify_payment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<StoredSubscription>, ApiError> {
    let plan = Plan::from_id(request.plan_id)
        .filter(|p| p.is_paid())
        .ok_or_else(|| ApiError::bad_request("Invalid plan"))?;
    let tx_hash = canonical_tx_hash(&request.tx_hash)
        .ok_or_else(|| ApiError::bad_request("Invalid transaction hash"))?;
    let wallet_address = match request.wallet_address.as_deref() {
        Some(raw) => Some(
            Address::from_str(raw.trim())
                .map_err(|_| ApiError::bad_request("Invalid wallet address"))?,
        ),
        None => None,
    };

    if !state.proofs.claim_payment_tx(&tx_hash, &user.user_id)? {
        return Err(ApiError::conflict("Payment transaction has already been used"));
    }

    let release = |state: &AppState| {
        if let Err(e) = state.proofs.release_payment_tx(&tx_hash) {
            tracing::error!(tx_hash = %tx_hash, error = %e, "Failed to release payment claim");
        }
    };

    let receipt = match state
        .ledger
        .wait_for_receipt(&tx_hash, state.receipt_poll_interval, state.receipt_timeout)
        .await
    {
        Ok(receipt) => receipt,
        Err(e) => {
            release(&state);
            tracing::warn!(tx_hash = %tx_hash, user_id = %user.user_id, error = %e, "Payment receipt unavailable");
            return Err(e.into());
        }
    };

    let reject = |reason: &str| {
        release(&state);
        tracing::warn!(tx_hash = %tx_hash, user_id = %user.user_id, reason, "Payment rejected");
        record_audit(
            &state,
            AuditEvent::new(AuditEventType::PaymentRejected)
                .with_user(&user.user_id)
                .with_resource("transaction", &tx_hash)
                .failed(reason),
        );
        ApiError::bad_request(reason)
    };

    if !receipt.success {
        return Err(reject("Transaction failed on-chain"));
    }
    let Some(payment) = receipt.subscription_payment() else {
        return Err(reject("Transaction is not a ProofNest subscription payment"));
    };
    if payment.plan_id != plan.id() || payment.is_annual != request.is_annual {
        return Err(reject("Payment does not match the requested plan"));
    }
    if wallet_address.is_some_and(|wallet| wallet != payment.user) {
        return Err(reject("Payment was sent from a different wallet"));
    }

    let repo = SubscriptionRepository::new(state.storage());
    let existing = match repo.get(&user.user_id) {
        Ok(existing) => existing,
        Err(e) => {
            release(&state);
            return Err(e.into());
        }
    };
    let subscription = StoredSubscription::apply_payment(
        existing.as_ref(),
        &user.user_id,
        plan.id(),
        request.is_annual,
        &tx_hash,
        Some(payment.user.to_string()),
        Utc::now(),
    );
    if let Err(e) = repo.upsert(&subscription) {
        release(&state);
        return Err(e.into());
    }

    tracing::info!(
        user_id = %user.user_id,
        plan = plan.name(),
        is_annual = request.is_annual,
        tx_hash = %tx_hash,
        block_number = receipt.block_number,
        expires_at = %subscription.expires_at,
        "Subscription payment verified"
    );
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::SubscriptionVerified)
            .with_user(&user.user_id)
            .with_resource("transaction", &tx_hash)
            .with_details(serde_json::json!({
                "plan": plan.name(),
                "is_annual": request.is_annual,
                "expires_at": subscription.expires_at,
            })),
    );

    Ok(Json(subscription))
}
