// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Ownership checks for user-scoped resources.
//!
//! A resource owned by someone else is reported as not found, so callers
//! cannot probe for other users' ids.

use crate::auth::AuthenticatedUser;

use super::{StorageError, StorageResult};

/// A resource that belongs to exactly one user.
pub trait OwnedResource {
    fn owner_user_id(&self) -> &str;

    /// Human-readable label used in error messages, e.g. `Proof 1234`.
    fn resource_label(&self) -> String;
}

/// Ownership verification for a loaded resource.
pub trait OwnershipEnforcer {
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()> {
        if self.owner_user_id() == user.user_id {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %user.user_id,
                resource = %self.resource_label(),
                "Ownership check failed"
            );
            Err(StorageError::NotFound(self.resource_label()))
        }
    }
}

/// Verify ownership on a lookup result and hand back the resource.
pub trait OwnershipCheck<T> {
    fn verify_owner(self, user: &AuthenticatedUser) -> StorageResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for StorageResult<T> {
    fn verify_owner(self, user: &AuthenticatedUser) -> StorageResult<T> {
        let resource = self?;
        resource.verify_ownership(user)?;
        Ok(resource)
    }
}
