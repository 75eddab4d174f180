// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! In-process ProofNest contract.
//!
//! [`ContractState`] mirrors the contract's storage and `require` checks:
//! a first-writer-wins `proofs` mapping, the plan price table, and the
//! `subscriptions` mapping extended by `subscribe`. [`LocalLedger`] wraps it
//! with a block counter and per-transaction receipts so the service can run
//! without an RPC endpoint.
//!
//! Transactions sent through the relay behave like a wallet that estimates
//! gas first: a revert is returned as an error and nothing is mined.
//! Transactions "sent from a user's wallet" ([`LocalLedger::submit_add_proof`],
//! [`LocalLedger::submit_subscribe`]) are always mined; a revert produces a
//! failed receipt, which is what the reconciler and payment verification see.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use chrono::Utc;

use super::ledger::{ContractError, LedgerError, ProofLedger};
use super::types::{
    canonical_tx_hash, ContractEvent, NetworkConfig, OnChainProof, SubscriptionPayment, TxReceipt,
    LOCAL,
};
use crate::quota::billing_period_days;

/// Address used as the relay signer of the local chain.
pub const LOCAL_RELAY_ADDRESS: Address = Address::repeat_byte(0x11);

/// 1 ether in wei.
const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Monthly plan prices in wei, indexed by plan id.
const MONTHLY_PRICES_WEI: [u128; 3] = [0, WEI_PER_ETHER / 200, WEI_PER_ETHER / 80];

/// Contract storage and rules.
#[derive(Debug, Clone)]
pub struct ContractState {
    proofs: HashMap<B256, OnChainProof>,
    subscriptions: HashMap<Address, SubscriptionPayment>,
    prices: HashMap<(u64, bool), U256>,
}

impl Default for ContractState {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractState {
    /// Deploy with the default price table (annual = 12 months at 20% off).
    pub fn new() -> Self {
        let mut prices = HashMap::new();
        for (plan_id, monthly) in MONTHLY_PRICES_WEI.iter().enumerate() {
            let plan_id = plan_id as u64;
            prices.insert((plan_id, false), U256::from(*monthly));
            prices.insert((plan_id, true), U256::from(monthly * 12 * 8 / 10));
        }
        Self {
            proofs: HashMap::new(),
            subscriptions: HashMap::new(),
            prices,
        }
    }

    /// `addProof(bytes32)`: record `(sender, timestamp)` unless already present.
    pub fn add_proof(
        &mut self,
        sender: Address,
        digest: B256,
        timestamp: u64,
    ) -> Result<OnChainProof, ContractError> {
        if self.proofs.contains_key(&digest) {
            return Err(ContractError::ProofAlreadyExists);
        }
        let proof = OnChainProof {
            owner: sender,
            timestamp,
        };
        self.proofs.insert(digest, proof);
        Ok(proof)
    }

    /// `proofs(bytes32)`.
    pub fn proof(&self, digest: &B256) -> Option<OnChainProof> {
        self.proofs.get(digest).copied()
    }

    /// `getPrice(planId, isAnnual)`.
    pub fn get_price(&self, plan_id: u64, is_annual: bool) -> Result<U256, ContractError> {
        self.prices
            .get(&(plan_id, is_annual))
            .copied()
            .ok_or(ContractError::InvalidPlan)
    }

    /// `subscribe(planId, isAnnual)` with `msg.value = value`.
    ///
    /// The period is added to the current expiry while it is still in the
    /// future, otherwise to `now`.
    pub fn subscribe(
        &mut self,
        sender: Address,
        plan_id: u64,
        is_annual: bool,
        value: U256,
        now: u64,
    ) -> Result<SubscriptionPayment, ContractError> {
        let price = self.get_price(plan_id, is_annual)?;
        if price.is_zero() {
            return Err(ContractError::InvalidPlan);
        }
        if value != price {
            return Err(ContractError::IncorrectPayment);
        }

        let period = billing_period_days(is_annual) as u64 * 86_400;
        let base = match self.subscriptions.get(&sender) {
            Some(current) if current.expires_at > now => current.expires_at,
            _ => now,
        };
        let subscription = SubscriptionPayment {
            user: sender,
            plan_id,
            is_annual,
            expires_at: base + period,
        };
        self.subscriptions.insert(sender, subscription);
        Ok(subscription)
    }
}

#[derive(Debug, Default)]
struct LocalChain {
    contract: ContractState,
    block_number: u64,
    nonce: u64,
    receipts: HashMap<String, TxReceipt>,
}

impl LocalChain {
    /// Mine a transaction into its own block and store the receipt.
    /// A reverted transaction emits no events.
    fn mine(
        &mut self,
        from: Address,
        payload: &[u8],
        events: Option<Vec<ContractEvent>>,
    ) -> String {
        self.nonce += 1;
        self.block_number += 1;

        let mut preimage = self.nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(payload);
        let tx_hash = format!("{:?}", keccak256(&preimage));

        self.receipts.insert(
            tx_hash.clone(),
            TxReceipt {
                tx_hash: tx_hash.clone(),
                block_number: self.block_number,
                success: events.is_some(),
                from,
                events: events.unwrap_or_default(),
            },
        );
        tx_hash
    }
}

/// [`ProofLedger`] backed by an in-process [`ContractState`].
pub struct LocalLedger {
    relay: Option<Address>,
    chain: Mutex<LocalChain>,
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLedger {
    /// Local chain with a relay signer at [`LOCAL_RELAY_ADDRESS`].
    pub fn new() -> Self {
        Self {
            relay: Some(LOCAL_RELAY_ADDRESS),
            chain: Mutex::new(LocalChain::default()),
        }
    }

    /// Local chain without a relay signer (wallet-only anchoring).
    pub fn read_only() -> Self {
        Self {
            relay: None,
            chain: Mutex::new(LocalChain::default()),
        }
    }

    fn with_chain<T>(&self, f: impl FnOnce(&mut LocalChain) -> T) -> Result<T, LedgerError> {
        let mut chain = self
            .chain
            .lock()
            .map_err(|_| LedgerError::Rpc("local chain lock poisoned".to_string()))?;
        Ok(f(&mut chain))
    }

    /// A user's wallet sends `addProof(digest)`. Always mined; reverts yield
    /// a failed receipt.
    pub fn submit_add_proof(&self, sender: Address, digest: B256) -> Result<String, LedgerError> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.with_chain(|chain| {
            let events = chain
                .contract
                .add_proof(sender, digest, now)
                .ok()
                .map(|proof| vec![proof_added(digest, proof)]);
            let mut payload = b"addProof".to_vec();
            payload.extend_from_slice(sender.as_slice());
            payload.extend_from_slice(digest.as_slice());
            chain.mine(sender, &payload, events)
        })
    }

    /// A user's wallet sends `subscribe(planId, isAnnual)` with `value` wei.
    pub fn submit_subscribe(
        &self,
        sender: Address,
        plan_id: u64,
        is_annual: bool,
        value: U256,
    ) -> Result<String, LedgerError> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.with_chain(|chain| {
            let events = chain
                .contract
                .subscribe(sender, plan_id, is_annual, value, now)
                .ok()
                .map(|payment| vec![ContractEvent::Subscribed(payment)]);
            let mut payload = b"subscribe".to_vec();
            payload.extend_from_slice(sender.as_slice());
            payload.extend_from_slice(&plan_id.to_be_bytes());
            payload.push(is_annual as u8);
            chain.mine(sender, &payload, events)
        })
    }
}

fn proof_added(digest: B256, proof: OnChainProof) -> ContractEvent {
    ContractEvent::ProofAdded {
        content_hash: digest,
        proof,
    }
}

#[async_trait]
impl ProofLedger for LocalLedger {
    fn network(&self) -> &NetworkConfig {
        &LOCAL
    }

    fn can_submit(&self) -> bool {
        self.relay.is_some()
    }

    async fn add_proof(&self, digest: B256) -> Result<String, LedgerError> {
        let relay = self.relay.ok_or(LedgerError::ReadOnly)?;
        let now = Utc::now().timestamp().max(0) as u64;
        self.with_chain(|chain| -> Result<String, LedgerError> {
            let proof = chain.contract.add_proof(relay, digest, now)?;
            let mut payload = b"addProof".to_vec();
            payload.extend_from_slice(relay.as_slice());
            payload.extend_from_slice(digest.as_slice());
            Ok(chain.mine(relay, &payload, Some(vec![proof_added(digest, proof)])))
        })?
    }

    async fn proof_record(&self, digest: B256) -> Result<Option<OnChainProof>, LedgerError> {
        self.with_chain(|chain| chain.contract.proof(&digest))
    }

    async fn plan_price(&self, plan_id: u64, is_annual: bool) -> Result<U256, LedgerError> {
        self.with_chain(|chain| chain.contract.get_price(plan_id, is_annual))?
            .map_err(LedgerError::from)
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, LedgerError> {
        let key = canonical_tx_hash(tx_hash)
            .ok_or_else(|| LedgerError::InvalidTxHash(tx_hash.to_string()))?;
        self.with_chain(|chain| chain.receipts.get(&key).cloned())
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.with_chain(|chain| chain.block_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn digest(seed: &str) -> B256 {
        keccak256(seed.as_bytes())
    }

    #[test]
    fn first_writer_wins() {
        let mut contract = ContractState::new();
        let alice = Address::repeat_byte(0xaa);
        let bob = Address::repeat_byte(0xbb);
        let hash = digest("new-proof");

        contract.add_proof(alice, hash, 100).unwrap();
        assert_eq!(
            contract.add_proof(bob, hash, 200),
            Err(ContractError::ProofAlreadyExists)
        );

        let stored = contract.proof(&hash).unwrap();
        assert_eq!(stored.owner, alice);
        assert_eq!(stored.timestamp, 100);
    }

    #[test]
    fn unknown_digest_has_no_owner() {
        let contract = ContractState::new();
        assert!(contract.proof(&digest("missing")).is_none());
    }

    #[test]
    fn annual_price_is_discounted_year() {
        let contract = ContractState::new();
        let monthly = contract.get_price(1, false).unwrap();
        let annual = contract.get_price(1, true).unwrap();
        assert_eq!(annual, monthly * U256::from(12u64) * U256::from(8u64) / U256::from(10u64));
        assert_eq!(contract.get_price(0, false).unwrap(), U256::ZERO);
        assert_eq!(contract.get_price(9, false), Err(ContractError::InvalidPlan));
    }

    #[test]
    fn subscribe_requires_exact_payment() {
        let mut contract = ContractState::new();
        let user = Address::repeat_byte(0xcc);
        let price = contract.get_price(1, false).unwrap();

        assert_eq!(
            contract.subscribe(user, 1, false, price - U256::from(1u64), 0),
            Err(ContractError::IncorrectPayment)
        );
        assert_eq!(
            contract.subscribe(user, 0, false, U256::ZERO, 0),
            Err(ContractError::InvalidPlan)
        );

        let sub = contract.subscribe(user, 1, false, price, 1_000).unwrap();
        assert_eq!(sub.expires_at, 1_000 + 30 * 86_400);
    }

    #[test]
    fn subscribe_extends_active_subscription() {
        let mut contract = ContractState::new();
        let user = Address::repeat_byte(0xdd);
        let price = contract.get_price(2, false).unwrap();

        let first = contract.subscribe(user, 2, false, price, 1_000).unwrap();
        let second = contract.subscribe(user, 2, false, price, 2_000).unwrap();
        assert_eq!(second.expires_at, first.expires_at + 30 * 86_400);

        // Lapsed subscriptions restart from now.
        let later = second.expires_at + 10;
        let third = contract.subscribe(user, 2, false, price, later).unwrap();
        assert_eq!(third.expires_at, later + 30 * 86_400);
    }

    #[tokio::test]
    async fn relay_add_proof_mines_and_rejects_duplicates() {
        let ledger = LocalLedger::new();
        let hash = digest("duplicate-proof");

        let tx = ledger.add_proof(hash).await.unwrap();
        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.block_number, 1);

        let err = ledger.add_proof(hash).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Reverted(ContractError::ProofAlreadyExists)
        ));
        assert_eq!(ledger.block_number().await.unwrap(), 1);

        let record = ledger.proof_record(hash).await.unwrap().unwrap();
        assert_eq!(record.owner, LOCAL_RELAY_ADDRESS);
        assert_eq!(receipt.from, LOCAL_RELAY_ADDRESS);
        assert_eq!(receipt.proof_added(hash), Some(record));
    }

    #[tokio::test]
    async fn read_only_ledger_cannot_relay() {
        let ledger = LocalLedger::read_only();
        assert!(!ledger.can_submit());
        assert!(matches!(
            ledger.add_proof(digest("x")).await,
            Err(LedgerError::ReadOnly)
        ));
    }

    #[tokio::test]
    async fn wallet_submissions_record_failed_receipts_on_revert() {
        let ledger = LocalLedger::read_only();
        let user = Address::repeat_byte(0xee);
        let hash = digest("wallet-proof");

        let ok = ledger.submit_add_proof(user, hash).unwrap();
        let dup = ledger.submit_add_proof(user, hash).unwrap();
        assert_ne!(ok, dup);

        let mined = ledger.transaction_receipt(&ok).await.unwrap().unwrap();
        assert!(mined.success);
        assert_eq!(mined.proof_added(hash).unwrap().owner, user);

        let reverted = ledger.transaction_receipt(&dup).await.unwrap().unwrap();
        assert!(!reverted.success);
        assert!(reverted.events.is_empty());
    }

    #[tokio::test]
    async fn wallet_subscribe_emits_subscribed() {
        let ledger = LocalLedger::read_only();
        let user = Address::repeat_byte(0x42);
        let price = ledger.plan_price(1, true).await.unwrap();

        let tx = ledger.submit_subscribe(user, 1, true, price).unwrap();
        let receipt = ledger.transaction_receipt(&tx).await.unwrap().unwrap();
        assert!(receipt.success);
        let payment = receipt.subscription_payment().unwrap();
        assert_eq!(payment.user, user);
        assert_eq!(payment.plan_id, 1);
        assert!(payment.is_annual);

        let underpaid = ledger.submit_subscribe(user, 2, true, U256::from(1u64)).unwrap();
        let receipt = ledger.transaction_receipt(&underpaid).await.unwrap().unwrap();
        assert!(!receipt.success);
        assert!(receipt.subscription_payment().is_none());
    }

    #[tokio::test]
    async fn wait_for_receipt_times_out_for_unknown_tx() {
        let ledger = LocalLedger::new();
        let unknown = format!("0x{}", "0".repeat(64));
        let err = ledger
            .wait_for_receipt(&unknown, Duration::from_millis(5), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[tokio::test]
    async fn wait_for_receipt_returns_mined_receipt() {
        let ledger = LocalLedger::new();
        let tx = ledger.add_proof(digest("mined")).await.unwrap();
        let receipt = ledger
            .wait_for_receipt(&tx, Duration::from_millis(5), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(receipt.tx_hash, tx);
    }
}
