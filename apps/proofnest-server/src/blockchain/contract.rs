// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! ProofNest contract client over JSON-RPC.

use std::str::FromStr;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::Log,
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolEvent,
};
use async_trait::async_trait;

use super::ledger::{ContractError, LedgerError, ProofLedger};
use super::types::{ContractEvent, NetworkConfig, OnChainProof, SubscriptionPayment, TxReceipt};

sol! {
    #[sol(rpc)]
    interface IProofNest {
        event ProofAdded(bytes32 indexed contentHash, address indexed owner, uint256 timestamp);
        event Subscribed(address indexed user, uint256 planId, bool isAnnual, uint256 expiresAt);

        function addProof(bytes32 contentHash) external;
        function proofs(bytes32 contentHash) external view returns (address owner, uint256 timestamp);
        function getPrice(uint256 planId, bool isAnnual) external view returns (uint256);
        function subscribe(uint256 planId, bool isAnnual) external payable;
    }
}

/// Map an RPC/contract failure, recognizing the contract's revert reasons.
fn contract_error(err: impl std::fmt::Display) -> LedgerError {
    let message = err.to_string();
    match ContractError::from_revert_message(&message) {
        Some(reason) => LedgerError::Reverted(reason),
        None => LedgerError::Contract(message),
    }
}

/// Decode a ProofNest event; other logs yield `None`.
fn decode_event(log: &Log) -> Option<ContractEvent> {
    if let Ok(added) = IProofNest::ProofAdded::decode_log(&log.inner) {
        return Some(ContractEvent::ProofAdded {
            content_hash: added.data.contentHash,
            proof: OnChainProof {
                owner: added.data.owner,
                timestamp: added.data.timestamp.saturating_to::<u64>(),
            },
        });
    }
    let subscribed = IProofNest::Subscribed::decode_log(&log.inner).ok()?;
    Some(ContractEvent::Subscribed(SubscriptionPayment {
        user: subscribed.data.user,
        plan_id: subscribed.data.planId.saturating_to::<u64>(),
        is_annual: subscribed.data.isAnnual,
        expires_at: subscribed.data.expiresAt.saturating_to::<u64>(),
    }))
}

fn parse_tx_hash(tx_hash: &str) -> Result<TxHash, LedgerError> {
    TxHash::from_str(tx_hash.trim()).map_err(|e| LedgerError::InvalidTxHash(e.to_string()))
}

/// [`ProofLedger`] talking to a deployed ProofNest contract.
pub struct EvmLedger {
    network: NetworkConfig,
    contract: IProofNest::IProofNestInstance<DynProvider>,
    provider: DynProvider,
    relay: Option<Address>,
}

impl EvmLedger {
    /// Connect to `rpc_url`. With a `signer`, `addProof` can be relayed on
    /// behalf of users; without one the ledger is read-only.
    pub fn new(
        network: NetworkConfig,
        rpc_url: &str,
        contract_address: &str,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, LedgerError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;
        let address = Address::from_str(contract_address)
            .map_err(|e| LedgerError::InvalidAddress(e.to_string()))?;

        let relay = signer.as_ref().map(|s| s.address());
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased(),
            None => ProviderBuilder::new().connect_http(url).erased(),
        };
        let contract = IProofNest::new(address, provider.clone());

        Ok(Self {
            network,
            contract,
            provider,
            relay,
        })
    }

    /// Address of the relay signer, if configured.
    pub fn relay_address(&self) -> Option<Address> {
        self.relay
    }
}

#[async_trait]
impl ProofLedger for EvmLedger {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn can_submit(&self) -> bool {
        self.relay.is_some()
    }

    async fn add_proof(&self, digest: B256) -> Result<String, LedgerError> {
        if self.relay.is_none() {
            return Err(LedgerError::ReadOnly);
        }
        let pending = self
            .contract
            .addProof(digest)
            .send()
            .await
            .map_err(contract_error)?;
        let tx_hash = format!("{:?}", pending.tx_hash());
        tracing::info!(tx_hash = %tx_hash, network = self.network.key, "addProof submitted");
        Ok(tx_hash)
    }

    async fn proof_record(&self, digest: B256) -> Result<Option<OnChainProof>, LedgerError> {
        let record = self
            .contract
            .proofs(digest)
            .call()
            .await
            .map_err(contract_error)?;
        if record.owner == Address::ZERO {
            return Ok(None);
        }
        Ok(Some(OnChainProof {
            owner: record.owner,
            timestamp: record.timestamp.saturating_to::<u64>(),
        }))
    }

    async fn plan_price(&self, plan_id: u64, is_annual: bool) -> Result<U256, LedgerError> {
        self.contract
            .getPrice(U256::from(plan_id), is_annual)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, LedgerError> {
        let hash = parse_tx_hash(tx_hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| LedgerError::Rpc(format!("Failed to get receipt: {}", e)))?;

        let contract = *self.contract.address();
        Ok(receipt.map(|r| TxReceipt {
            tx_hash: format!("{:?}", hash),
            block_number: r.block_number.unwrap_or(0),
            success: r.status(),
            from: r.from,
            events: r
                .inner
                .logs()
                .iter()
                .filter(|log| log.address() == contract)
                .filter_map(decode_event)
                .collect(),
        }))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::SEPOLIA;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn rejects_bad_rpc_url() {
        let result = EvmLedger::new(SEPOLIA, "not a url", CONTRACT, None);
        assert!(matches!(result, Err(LedgerError::InvalidRpcUrl(_))));
    }

    #[test]
    fn rejects_bad_contract_address() {
        let result = EvmLedger::new(SEPOLIA, SEPOLIA.default_rpc_url, "0x1234", None);
        assert!(matches!(result, Err(LedgerError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn without_signer_is_read_only() {
        let ledger = EvmLedger::new(SEPOLIA, SEPOLIA.default_rpc_url, CONTRACT, None).unwrap();
        assert!(!ledger.can_submit());
        assert!(ledger.relay_address().is_none());
        assert!(matches!(
            ledger.add_proof(B256::ZERO).await,
            Err(LedgerError::ReadOnly)
        ));
    }

    #[tokio::test]
    async fn receipt_lookup_validates_hash() {
        let ledger = EvmLedger::new(SEPOLIA, SEPOLIA.default_rpc_url, CONTRACT, None).unwrap();
        assert!(matches!(
            ledger.transaction_receipt("0xnothex").await,
            Err(LedgerError::InvalidTxHash(_))
        ));
    }

    #[test]
    fn decodes_contract_events() {
        let digest = B256::repeat_byte(0x5a);
        let owner = Address::repeat_byte(0x22);
        let added = IProofNest::ProofAdded {
            contentHash: digest,
            owner,
            timestamp: U256::from(1_700_000_000u64),
        };
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::from_str(CONTRACT).unwrap(),
                data: added.encode_log_data(),
            },
            ..Default::default()
        };
        assert_eq!(
            decode_event(&log),
            Some(ContractEvent::ProofAdded {
                content_hash: digest,
                proof: OnChainProof {
                    owner,
                    timestamp: 1_700_000_000,
                },
            })
        );

        let subscribed = IProofNest::Subscribed {
            user: owner,
            planId: U256::from(2u64),
            isAnnual: true,
            expiresAt: U256::from(1_800_000_000u64),
        };
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::from_str(CONTRACT).unwrap(),
                data: subscribed.encode_log_data(),
            },
            ..Default::default()
        };
        assert_eq!(
            decode_event(&log),
            Some(ContractEvent::Subscribed(SubscriptionPayment {
                user: owner,
                plan_id: 2,
                is_annual: true,
                expires_at: 1_800_000_000,
            }))
        );
    }

    #[test]
    fn revert_reason_maps_to_contract_error() {
        let err = contract_error("execution reverted: Proof already exists");
        assert!(matches!(
            err,
            LedgerError::Reverted(ContractError::ProofAlreadyExists)
        ));
        assert!(matches!(contract_error("boom"), LedgerError::Contract(_)));
    }
}
