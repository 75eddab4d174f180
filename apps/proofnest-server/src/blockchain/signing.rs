// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Relay signer loading.
//!
//! The relay key submits `addProof` for users who anchor through the service.
//! It is read either from `SIGNER_PRIVATE_KEY` (hex) or from a PEM file at
//! `SIGNER_KEY_PATH` (SEC1 or PKCS#8).

use std::path::Path;

use alloy::signers::local::PrivateKeySigner;
use k256::SecretKey;

use super::ledger::LedgerError;

/// Create a signer from a hex private key (with or without `0x`).
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, LedgerError> {
    let trimmed = private_key_hex.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let key_bytes =
        alloy::hex::decode(hex).map_err(|e| LedgerError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| LedgerError::InvalidPrivateKey(e.to_string()))
}

/// Parse a PEM private key and return the raw key as hex (no `0x`).
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, LedgerError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| LedgerError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| LedgerError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| LedgerError::InvalidPrivateKey(format!("Invalid key format: {}", e)))?;

    Ok(alloy::hex::encode(secret_key.to_bytes()))
}

/// Create a signer from PEM-encoded private key bytes.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, LedgerError> {
    signer_from_hex(&pem_to_hex(pem_bytes)?)
}

/// Load the relay signer from configuration. The inline key wins over the
/// key file; neither set means no relay.
pub fn load_relay_signer(
    private_key_hex: Option<&str>,
    key_path: Option<&Path>,
) -> Result<Option<PrivateKeySigner>, LedgerError> {
    if let Some(hex) = private_key_hex.filter(|k| !k.trim().is_empty()) {
        return signer_from_hex(hex).map(Some);
    }
    if let Some(path) = key_path {
        let bytes = std::fs::read(path).map_err(|e| {
            LedgerError::InvalidPrivateKey(format!("Cannot read {}: {}", path.display(), e))
        })?;
        return signer_from_pem(&bytes).map(Some);
    }
    Ok(None)
}
