// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Blockchain types and network constants.

use alloy::primitives::{Address, B256};
use chrono::{DateTime, TimeZone, Utc};

/// EVM network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Short identifier stored with every proof (`chain` column)
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Default RPC endpoint URL (overridable with `RPC_URL`)
    pub default_rpc_url: &'static str,
    /// Block explorer URL (empty when the network has none)
    pub explorer_url: &'static str,
}

impl NetworkConfig {
    /// Explorer link for a transaction, if the network has an explorer.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.explorer_url.is_empty() {
            None
        } else {
            Some(format!("{}/tx/{}", self.explorer_url, tx_hash))
        }
    }
}

/// Ethereum Sepolia testnet, where the ProofNest contract is deployed.
pub const SEPOLIA: NetworkConfig = NetworkConfig {
    key: "sepolia",
    name: "Ethereum Sepolia",
    chain_id: 11_155_111,
    default_rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
    explorer_url: "https://sepolia.etherscan.io",
};

/// In-process chain used for development and tests.
pub const LOCAL: NetworkConfig = NetworkConfig {
    key: "local",
    name: "Local ProofNest Chain",
    chain_id: 31_337,
    default_rpc_url: "",
    explorer_url: "",
};

/// Resolve a network from its configuration key.
pub fn network_from_key(raw: &str) -> Result<NetworkConfig, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sepolia" => Ok(SEPOLIA),
        "local" => Ok(LOCAL),
        other => Err(format!(
            "Unsupported chain `{other}` (expected `sepolia` or `local`)"
        )),
    }
}

/// Validate a transaction hash and return it as `0x` + 64 lowercase hex chars.
pub fn canonical_tx_hash(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex.to_ascii_lowercase()))
}

/// Transaction receipt after inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block number where the transaction was included
    pub block_number: u64,
    /// Whether the transaction executed successfully
    pub success: bool,
    /// Sender of the transaction
    pub from: Address,
    /// Events emitted by the ProofNest contract, in log order
    pub events: Vec<ContractEvent>,
}

impl TxReceipt {
    /// The `ProofAdded` record this transaction emitted for `digest`.
    pub fn proof_added(&self, digest: B256) -> Option<OnChainProof> {
        self.events.iter().find_map(|event| match event {
            ContractEvent::ProofAdded {
                content_hash,
                proof,
            } if *content_hash == digest => Some(*proof),
            _ => None,
        })
    }

    /// The `Subscribed` event of a `subscribe` payment.
    pub fn subscription_payment(&self) -> Option<SubscriptionPayment> {
        self.events.iter().find_map(|event| match event {
            ContractEvent::Subscribed(payment) => Some(*payment),
            _ => None,
        })
    }
}

/// Decoded ProofNest contract event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractEvent {
    /// `ProofAdded(contentHash, owner, timestamp)`
    ProofAdded {
        content_hash: B256,
        proof: OnChainProof,
    },
    /// `Subscribed(user, planId, isAnnual, expiresAt)`
    Subscribed(SubscriptionPayment),
}

/// A paid subscription as reported by the `Subscribed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionPayment {
    pub user: Address,
    pub plan_id: u64,
    pub is_annual: bool,
    /// Expiry (Unix seconds)
    pub expires_at: u64,
}

/// A proof as recorded by the contract's `proofs(bytes32)` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnChainProof {
    /// Address that submitted `addProof`
    pub owner: Address,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
}

impl OnChainProof {
    pub fn owner_hex(&self) -> String {
        format!("{:?}", self.owner)
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_default()
    }
}
