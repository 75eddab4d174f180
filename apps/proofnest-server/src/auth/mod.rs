// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! # Authentication Module
//!
//! Bearer JWT authentication for the ProofNest API.
//!
//! ## Auth Flow
//!
//! 1. The front end signs the user in with the identity provider
//! 2. It sends `Authorization: Bearer <JWT>`
//! 3. The server:
//!    - verifies the signature (JWKS or shared secret), expiry, issuer, audience
//!    - takes `sub` as the canonical `user_id`
//!    - reads the role from `role`, `app_metadata.role` or `publicMetadata.role`
//!
//! Health, hashing, plans and the public proof page need no token.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use jwks::JwksManager;
pub use roles::Role;
