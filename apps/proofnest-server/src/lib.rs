// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! ProofNest Server - Proof-of-Existence Service
//!
//! Users submit content; the server fingerprints it (SHA-256 of the
//! normalized text), keeps the content private and anchors the fingerprint
//! on an EVM chain through the ProofNest contract. A background reconciler
//! moves proofs from `pending` to `confirmed` or `failed` as receipts land.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) and the OpenAPI document
//! - `auth` - Bearer JWT authentication and roles
//! - `blockchain` - Contract access (JSON-RPC or in-process)
//! - `hashing` - Content normalization and fingerprints
//! - `quota` - Plans and monthly proof limits
//! - `reconciler` - Pending proof confirmation
//! - `storage` - Proof database, documents and audit log

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod hashing;
pub mod quota;
pub mod reconciler;
pub mod state;
pub mod storage;
