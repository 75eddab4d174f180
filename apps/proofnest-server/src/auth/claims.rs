// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! JWT claims and the authenticated user.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims read from a bearer token.
///
/// Roles may be carried as a top-level `role` claim or inside
/// `app_metadata` / `publicMetadata`, depending on the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject: the canonical user id
    pub sub: String,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iss: String,
    /// Session id, if the provider issues one
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<RoleMetadata>,
    #[serde(default, rename = "publicMetadata")]
    pub public_metadata: Option<RoleMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

impl TokenClaims {
    /// First recognizable role claim, defaulting to `Client`.
    pub fn role(&self) -> Role {
        [
            self.role.as_deref(),
            self.app_metadata.as_ref().and_then(|m| m.role.as_deref()),
            self.public_metadata.as_ref().and_then(|m| m.role.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find_map(|r| r.parse().ok())
        .unwrap_or_default()
    }
}

/// The user making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user id (`sub` claim)
    pub user_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub issuer: String,
    /// Token expiry (Unix seconds)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims) -> Self {
        let role = claims.role();
        Self {
            user_id: claims.sub,
            role,
            session_id: claims.sid,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(json: serde_json::Value) -> TokenClaims {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn defaults_to_client() {
        let user = AuthenticatedUser::from_claims(claims(serde_json::json!({ "sub": "u1" })));
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.role, Role::Client);
        assert!(!user.is_admin());
    }

    #[test]
    fn role_sources() {
        let top = claims(serde_json::json!({ "sub": "u", "role": "admin" }));
        assert_eq!(top.role(), Role::Admin);

        let app = claims(serde_json::json!({ "sub": "u", "app_metadata": { "role": "admin" } }));
        assert_eq!(app.role(), Role::Admin);

        let public = claims(serde_json::json!({
            "sub": "u",
            "role": "authenticated",
            "publicMetadata": { "role": "Admin" }
        }));
        assert_eq!(public.role(), Role::Admin);
    }

    #[test]
    fn session_and_expiry_are_kept() {
        let user = AuthenticatedUser::from_claims(claims(serde_json::json!({
            "sub": "u1", "sid": "sess_1", "exp": 1_900_000_000, "iss": "https://id.example"
        })));
        assert_eq!(user.session_id.as_deref(), Some("sess_1"));
        assert_eq!(user.expires_at, 1_900_000_000);
        assert_eq!(user.issuer, "https://id.example");
    }
}
