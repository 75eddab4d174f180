// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Subscription repository.
//!
//! One subscription document per user, upserted after each verified
//! on-chain payment. The document mirrors what the contract recorded so the
//! quota can be enforced without a chain round-trip.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{DocumentStore, StorageResult};
use crate::quota::billing_period_days;

/// Subscription lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

/// Subscription stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredSubscription {
    pub user_id: String,
    /// Contract plan id (see `quota::Plan`)
    pub plan_id: u64,
    pub status: SubscriptionStatus,
    pub is_annual: bool,
    pub expires_at: DateTime<Utc>,
    /// Start of the current uninterrupted subscription
    pub start_date: DateTime<Utc>,
    /// Most recent payment transaction
    pub tx_hash: String,
    /// Wallet that paid, when the client reported it
    pub wallet_address: Option<String>,
    /// Every payment applied to this subscription, oldest first
    #[serde(default)]
    pub applied_tx_hashes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSubscription {
    /// Whether the subscription grants its plan at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at > now
    }

    /// Apply a verified payment on top of `existing`.
    ///
    /// A still-active subscription is extended from its current expiry;
    /// otherwise the new period starts at `now`.
    pub fn apply_payment(
        existing: Option<&StoredSubscription>,
        user_id: &str,
        plan_id: u64,
        is_annual: bool,
        tx_hash: &str,
        wallet_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let period = Duration::days(billing_period_days(is_annual));
        let active = existing.filter(|s| s.is_active_at(now));

        let (start_date, base) = match active {
            Some(current) => (current.start_date, current.expires_at),
            None => (now, now),
        };
        let mut applied_tx_hashes = existing
            .map(|s| s.applied_tx_hashes.clone())
            .unwrap_or_default();
        applied_tx_hashes.push(tx_hash.to_string());

        Self {
            user_id: user_id.to_string(),
            plan_id,
            status: SubscriptionStatus::Active,
            is_annual,
            expires_at: base + period,
            start_date,
            tx_hash: tx_hash.to_string(),
            wallet_address: wallet_address
                .or_else(|| existing.and_then(|s| s.wallet_address.clone())),
            applied_tx_hashes,
            updated_at: now,
        }
    }
}

pub struct SubscriptionRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> SubscriptionRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    /// Current subscription of a user. Lapsed subscriptions are reported
    /// with status `expired`.
    pub fn get(&self, user_id: &str) -> StorageResult<Option<StoredSubscription>> {
        let path = self.storage.paths().subscription(user_id);
        if !self.storage.exists(&path) {
            return Ok(None);
        }
        let mut subscription: StoredSubscription = self.storage.read_json(path)?;
        if subscription.expires_at <= Utc::now() {
            subscription.status = SubscriptionStatus::Expired;
        }
        Ok(Some(subscription))
    }

    /// Insert or replace the user's subscription.
    pub fn upsert(&self, subscription: &StoredSubscription) -> StorageResult<()> {
        self.storage.write_json(
            self.storage.paths().subscription(&subscription.user_id),
            subscription,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_payment_starts_now() {
        let sub = StoredSubscription::apply_payment(None, "u1", 1, false, "0xaa", None, at(1));
        assert_eq!(sub.start_date, at(1));
        assert_eq!(sub.expires_at, at(31));
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.applied_tx_hashes, vec!["0xaa".to_string()]);
    }

    #[test]
    fn renewal_extends_from_current_expiry() {
        let first = StoredSubscription::apply_payment(
            None,
            "u1",
            1,
            false,
            "0xaa",
            Some("0xwallet".to_string()),
            at(1),
        );
        let second =
            StoredSubscription::apply_payment(Some(&first), "u1", 2, true, "0xbb", None, at(10));

        assert_eq!(second.start_date, at(1));
        assert_eq!(second.expires_at, first.expires_at + Duration::days(365));
        assert_eq!(second.plan_id, 2);
        assert_eq!(second.wallet_address.as_deref(), Some("0xwallet"));
        assert_eq!(second.applied_tx_hashes.len(), 2);
    }

    #[test]
    fn lapsed_subscription_restarts() {
        let first = StoredSubscription::apply_payment(None, "u1", 1, false, "0xaa", None, at(1));
        let later = first.expires_at + Duration::days(2);
        let renewed =
            StoredSubscription::apply_payment(Some(&first), "u1", 1, false, "0xbb", None, later);

        assert_eq!(renewed.start_date, later);
        assert_eq!(renewed.expires_at, later + Duration::days(30));
    }

    #[test]
    fn upsert_and_get() {
        let temp = TempDir::new().unwrap();
        let mut storage = DocumentStore::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let repo = SubscriptionRepository::new(&storage);

        assert!(repo.get("auth0|u1").unwrap().is_none());

        let now = Utc::now();
        let sub = StoredSubscription::apply_payment(None, "auth0|u1", 1, false, "0xaa", None, now);
        repo.upsert(&sub).unwrap();
        assert_eq!(repo.get("auth0|u1").unwrap(), Some(sub.clone()));

        let mut lapsed = sub;
        lapsed.expires_at = now - Duration::days(1);
        repo.upsert(&lapsed).unwrap();
        assert_eq!(
            repo.get("auth0|u1").unwrap().unwrap().status,
            SubscriptionStatus::Expired
        );
    }
}
