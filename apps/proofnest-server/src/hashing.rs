// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Content fingerprinting.
//!
//! A fingerprint is the lowercase hex SHA-256 digest (64 characters, no `0x`
//! prefix) of the *normalized* content. Normalization trims surrounding
//! whitespace and converts CRLF line endings to LF so the same text pasted
//! from different editors produces the same digest.
//!
//! The contract stores digests as `bytes32`; [`digest_to_bytes32`] and
//! [`bytes32_to_digest`] convert between the two forms.

use alloy::primitives::B256;
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Normalize content before hashing.
pub fn normalize_content(content: &str) -> String {
    content.trim().replace("\r\n", "\n")
}

/// Hash raw content with SHA-256 and return the lowercase hex digest.
///
/// Empty input returns an empty string rather than the digest of nothing.
pub fn hash_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(content.as_bytes());
    alloy::hex::encode(digest)
}

/// Normalize then hash. This is the fingerprint stored with every proof.
pub fn fingerprint(content: &str) -> String {
    hash_content(&normalize_content(content))
}

/// Recompute the fingerprint of `content` and compare it with `digest`.
///
/// The comparison accepts an optional `0x` prefix and either hex case.
pub fn verify_content(content: &str, digest: &str) -> bool {
    let expected = match canonical_digest(digest) {
        Some(d) => d,
        None => return false,
    };
    let actual = fingerprint(content);
    !actual.is_empty() && actual == expected
}

/// Validate a user-supplied digest and return its canonical form
/// (lowercase, no `0x` prefix). Returns `None` if it is not 32 bytes of hex.
pub fn canonical_digest(digest: &str) -> Option<String> {
    let trimmed = digest.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.len() != DIGEST_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(hex.to_ascii_lowercase())
}

/// Convert a hex digest into the contract's `bytes32` argument.
pub fn digest_to_bytes32(digest: &str) -> Option<B256> {
    let canonical = canonical_digest(digest)?;
    let bytes = alloy::hex::decode(canonical).ok()?;
    Some(B256::from_slice(&bytes))
}

/// Convert a contract `bytes32` back into the stored digest form.
pub fn bytes32_to_digest(value: &B256) -> String {
    alloy::hex::encode(value.as_slice())
}

/// Shorten an address for display: `0x1234...abcd`.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_content("hello proof"), hash_content("hello proof"));
    }

    #[test]
    fn hash_matches_known_vector() {
        assert_eq!(
            hash_content("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_is_content_sensitive() {
        assert_ne!(hash_content("draft v1"), hash_content("draft v2"));
    }

    #[test]
    fn empty_input_returns_empty_digest() {
        assert_eq!(hash_content(""), "");
        assert_eq!(fingerprint("   \r\n  "), "");
    }

    #[test]
    fn normalization_ignores_line_endings_and_padding() {
        let windows = "  line one\r\nline two\r\n ";
        let unix = "line one\nline two";
        assert_eq!(normalize_content(windows), unix);
        assert_eq!(fingerprint(windows), fingerprint(unix));
    }

    #[test]
    fn verify_accepts_prefix_and_uppercase() {
        let digest = fingerprint("my manuscript");
        assert!(verify_content("my manuscript", &digest));
        assert!(verify_content("my manuscript", &format!("0x{}", digest.to_uppercase())));
        assert!(!verify_content("my manuscript!", &digest));
        assert!(!verify_content("my manuscript", "not-a-digest"));
    }

    #[test]
    fn bytes32_conversion_preserves_digest() {
        let digest = fingerprint("anchor me");
        let word = digest_to_bytes32(&digest).unwrap();
        assert_eq!(bytes32_to_digest(&word), digest);
        assert!(digest_to_bytes32("abcd").is_none());
    }

    #[test]
    fn short_address_formats() {
        assert_eq!(
            short_address("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12"),
            "0x742d...aB12"
        );
        assert_eq!(short_address("0x1234"), "0x1234");
    }
}
