// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Subscription plans and the monthly proof quota.
//!
//! Usage is counted per UTC calendar month: the window opens at 00:00:00 on
//! the first day of the month and every proof created since then counts
//! against the plan's ceiling.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{StoredSubscription, SubscriptionStatus};

/// Subscription plan. The discriminant is the on-chain plan id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Team,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Pro, Plan::Team];

    /// Plan id used by the contract's `getPrice` / `subscribe`.
    pub fn id(self) -> u64 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 1,
            Plan::Team => 2,
        }
    }

    pub fn from_id(id: u64) -> Option<Plan> {
        match id {
            0 => Some(Plan::Free),
            1 => Some(Plan::Pro),
            2 => Some(Plan::Team),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::Team => "Team",
        }
    }

    /// Proofs allowed per calendar month.
    pub fn monthly_limit(self) -> u64 {
        match self {
            Plan::Free => 3,
            Plan::Pro => 100,
            Plan::Team => 1000,
        }
    }

    /// Listed monthly price in whole US dollars.
    pub fn monthly_price_usd(self) -> u32 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 19,
            Plan::Team => 49,
        }
    }

    /// Listed per-month price when billed annually (20% off, rounded).
    pub fn annual_monthly_price_usd(self) -> u32 {
        (self.monthly_price_usd() * 8 + 5) / 10
    }

    /// Whether the plan is bought through the contract.
    pub fn is_paid(self) -> bool {
        self != Plan::Free
    }
}

/// Length of a subscription period in days.
pub fn billing_period_days(is_annual: bool) -> i64 {
    if is_annual {
        365
    } else {
        30
    }
}

/// First instant of the UTC calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// The plan that governs the quota right now.
///
/// A subscription only counts while it is active and not yet expired.
pub fn effective_plan(subscription: Option<&StoredSubscription>, now: DateTime<Utc>) -> Plan {
    match subscription {
        Some(sub) if sub.status == SubscriptionStatus::Active && sub.expires_at > now => {
            Plan::from_id(sub.plan_id).unwrap_or(Plan::Free)
        }
        _ => Plan::Free,
    }
}

/// Remaining allowance for the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuotaStatus {
    pub plan: Plan,
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    pub window_start: DateTime<Utc>,
}

/// Raised when a new proof would exceed the monthly ceiling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Monthly proof limit reached ({used}/{limit} on the {plan_name} plan). Upgrade your plan to create more proofs.")]
pub struct QuotaExceeded {
    pub plan_name: &'static str,
    pub used: u64,
    pub limit: u64,
}

/// Describe the quota window without enforcing it.
pub fn status(plan: Plan, used: u64, now: DateTime<Utc>) -> QuotaStatus {
    let limit = plan.monthly_limit();
    QuotaStatus {
        plan,
        limit,
        used,
        remaining: limit.saturating_sub(used),
        window_start: month_start(now),
    }
}

/// Allow one more proof iff `used < limit`.
pub fn check(plan: Plan, used: u64, now: DateTime<Utc>) -> Result<QuotaStatus, QuotaExceeded> {
    let current = status(plan, used, now);
    if used >= current.limit {
        return Err(QuotaExceeded {
            plan_name: plan.name(),
            used,
            limit: current.limit,
        });
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn subscription(plan: Plan, expires_at: DateTime<Utc>) -> StoredSubscription {
        StoredSubscription {
            user_id: "user-1".to_string(),
            plan_id: plan.id(),
            status: SubscriptionStatus::Active,
            is_annual: false,
            expires_at,
            start_date: expires_at - Duration::days(30),
            tx_hash: "0xabc".to_string(),
            wallet_address: None,
            applied_tx_hashes: vec!["0xabc".to_string()],
            updated_at: expires_at - Duration::days(30),
        }
    }

    #[test]
    fn limits_per_plan() {
        assert_eq!(Plan::Free.monthly_limit(), 3);
        assert_eq!(Plan::Pro.monthly_limit(), 100);
        assert_eq!(Plan::Team.monthly_limit(), 1000);
    }

    #[test]
    fn plan_ids_round_trip_through_contract_ids() {
        for plan in Plan::ALL {
            assert_eq!(Plan::from_id(plan.id()), Some(plan));
        }
        assert_eq!(Plan::from_id(7), None);
    }

    #[test]
    fn annual_pricing_is_discounted() {
        assert_eq!(Plan::Pro.annual_monthly_price_usd(), 15);
        assert_eq!(Plan::Team.annual_monthly_price_usd(), 39);
        assert_eq!(Plan::Free.annual_monthly_price_usd(), 0);
    }

    #[test]
    fn month_start_is_first_instant_of_month() {
        assert_eq!(month_start(at(2026, 10, 19, 15)), at(2026, 10, 1, 0));
        assert_eq!(month_start(at(2026, 1, 1, 0)), at(2026, 1, 1, 0));
    }

    #[test]
    fn check_blocks_at_limit() {
        let now = at(2026, 3, 10, 9);
        assert!(check(Plan::Free, 0, now).is_ok());
        assert_eq!(check(Plan::Free, 2, now).unwrap().remaining, 1);

        let err = check(Plan::Free, 3, now).unwrap_err();
        assert_eq!(err.limit, 3);
        assert!(err.to_string().contains("Upgrade"));
    }

    #[test]
    fn check_is_monotonic_in_usage() {
        let now = at(2026, 3, 10, 9);
        for plan in Plan::ALL {
            let mut blocked = false;
            for used in 0..=plan.monthly_limit() + 5 {
                let allowed = check(plan, used, now).is_ok();
                if blocked {
                    assert!(!allowed, "{plan:?} re-allowed at {used}");
                }
                blocked |= !allowed;
            }
            assert!(blocked);
        }
    }

    #[test]
    fn effective_plan_requires_unexpired_active_subscription() {
        let now = at(2026, 5, 5, 12);
        assert_eq!(effective_plan(None, now), Plan::Free);

        let active = subscription(Plan::Pro, now + Duration::days(3));
        assert_eq!(effective_plan(Some(&active), now), Plan::Pro);

        let lapsed = subscription(Plan::Team, now - Duration::seconds(1));
        assert_eq!(effective_plan(Some(&lapsed), now), Plan::Free);

        let mut cancelled = subscription(Plan::Team, now + Duration::days(3));
        cancelled.status = SubscriptionStatus::Expired;
        assert_eq!(effective_plan(Some(&cancelled), now), Plan::Free);
    }

    #[test]
    fn billing_periods() {
        assert_eq!(billing_period_days(false), 30);
        assert_eq!(billing_period_days(true), 365);
    }
}
