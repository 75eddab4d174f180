// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! The bridge between the service and the ProofNest contract.
//!
//! [`ProofLedger`] is implemented by [`super::EvmLedger`] (JSON-RPC against a
//! deployed contract) and [`super::LocalLedger`] (in-process contract used for
//! development and tests). Handlers and the reconciler only see the trait.

use std::time::Duration;

use alloy::primitives::{B256, U256};
use async_trait::async_trait;

use super::types::{NetworkConfig, OnChainProof, TxReceipt};

/// Revert reasons raised by the contract's `require` checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("Proof already exists")]
    ProofAlreadyExists,

    #[error("Invalid plan")]
    InvalidPlan,

    #[error("Incorrect payment")]
    IncorrectPayment,
}

impl ContractError {
    /// Recognize a revert reason inside an RPC error message.
    pub fn from_revert_message(message: &str) -> Option<Self> {
        [
            ContractError::ProofAlreadyExists,
            ContractError::InvalidPlan,
            ContractError::IncorrectPayment,
        ]
        .into_iter()
        .find(|reason| message.contains(&reason.to_string()))
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction reverted: {0}")]
    Reverted(#[from] ContractError),

    #[error("No relay signer configured; submit the transaction from a wallet instead")]
    ReadOnly,

    #[error("Timed out waiting for receipt of {0}")]
    Timeout(String),
}

/// Access to the ProofNest contract and its chain.
#[async_trait]
pub trait ProofLedger: Send + Sync {
    /// Network the contract lives on.
    fn network(&self) -> &NetworkConfig;

    /// Whether this ledger holds a relay signer and can submit `addProof`.
    fn can_submit(&self) -> bool;

    /// Submit `addProof(digest)` from the relay signer and return the tx hash.
    async fn add_proof(&self, digest: B256) -> Result<String, LedgerError>;

    /// Look up `proofs(digest)`; `None` when the digest was never anchored.
    async fn proof_record(&self, digest: B256) -> Result<Option<OnChainProof>, LedgerError>;

    /// Read `getPrice(planId, isAnnual)` in wei.
    async fn plan_price(&self, plan_id: u64, is_annual: bool) -> Result<U256, LedgerError>;

    /// Fetch the receipt of a transaction, `None` while it is not yet mined.
    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, LedgerError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Poll for a receipt until it appears or `timeout` elapses.
    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TxReceipt, LedgerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() + poll_interval > deadline {
                return Err(LedgerError::Timeout(tx_hash.to_string()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
