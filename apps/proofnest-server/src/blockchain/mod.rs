// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Blockchain integration for the ProofNest contract.
//!
//! This module provides:
//! - The [`ProofLedger`] abstraction used by handlers and the reconciler
//! - [`EvmLedger`], a JSON-RPC client for a deployed contract
//! - [`LocalLedger`], an in-process contract for development and tests
//! - Relay signer loading

pub mod contract;
pub mod ledger;
pub mod local;
pub mod signing;
pub mod types;

pub use contract::EvmLedger;
pub use ledger::{ContractError, LedgerError, ProofLedger};
pub use local::LocalLedger;
pub use types::*;
