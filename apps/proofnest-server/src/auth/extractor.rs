// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Axum extractors for authenticated users.
//!
//! ```rust,ignore
//! async fn list_proofs(Auth(user): Auth, State(state): State<AppState>) -> ... {
//!     // user.user_id is the token subject
//! }
//! ```
//!
//! ## Verification modes
//!
//! 1. `AUTH_JWKS_URL` set: RS/ES signature checked against the provider's JWKS.
//! 2. `AUTH_JWT_SECRET` set: HS256 signature checked against the shared secret.
//! 3. Neither: tokens are rejected, except in test builds or with the `dev`
//!    feature, where the payload is decoded without a signature check.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use super::claims::TokenClaims;
use super::{AuthError, AuthenticatedUser};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance in seconds.
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Requires a valid bearer token.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(parts)?;
        let user = verify_jwt(token, &state.auth_config).await?;
        tracing::debug!(user_id = %user.user_id, role = %user.role, "Authenticated request");

        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Requires the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "Admin endpoint refused");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

/// The caller when a valid token is present, `None` otherwise.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

async fn verify_jwt(token: &str, config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    if let Some(jwks) = &config.jwks {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let (key, algorithm) = jwks.decoding_key(header.kid.as_deref()).await?;
        return verify_signed(token, &key, algorithm, config);
    }

    if let Some(secret) = &config.jwt_secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        return verify_signed(token, &key, Algorithm::HS256, config);
    }

    verify_unsigned(token)
}

fn verify_signed(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let data = decode::<TokenClaims>(token, key, &validation)?;
    Ok(AuthenticatedUser::from_claims(data.claims))
}

/// Decode without a signature check. Development builds only.
#[cfg(any(test, feature = "dev"))]
fn verify_unsigned(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let data = jsonwebtoken::dangerous::insecure_decode::<TokenClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_unsigned(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::NotConfigured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::test_support::TestContext;
    use axum::http::Request;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn unsigned_jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{header}.{payload}.fake_signature")
    }

    fn parts_with_token(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn hs256_state(secret: &str, issuer: Option<&str>) -> TestContext {
        let mut ctx = TestContext::new();
        ctx.state = ctx.state.clone().with_auth_config(AuthConfig {
            jwt_secret: Some(secret.to_string()),
            issuer: issuer.map(str::to_string),
            ..AuthConfig::default()
        });
        ctx
    }

    fn hs256_token(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn requires_auth_header() {
        let ctx = TestContext::new();
        let mut parts = parts_with_token(None);
        let result = Auth::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let ctx = TestContext::new();
        let mut parts = Request::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let result = Auth::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn unsigned_token_accepted_in_test_builds() {
        let ctx = TestContext::new();
        let token = unsigned_jwt(serde_json::json!({
            "sub": "user_123", "exp": 9_999_999_999i64, "sid": "sess_1"
        }));
        let mut parts = parts_with_token(Some(&token));

        let Auth(user) = Auth::from_request_parts(&mut parts, &ctx.state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.session_id.as_deref(), Some("sess_1"));
        assert!(parts.extensions.get::<AuthenticatedUser>().is_some());
    }

    #[tokio::test]
    async fn expired_unsigned_token_rejected() {
        let ctx = TestContext::new();
        let token = unsigned_jwt(serde_json::json!({ "sub": "user_123", "exp": 1_000 }));
        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn hs256_token_verified() {
        let ctx = hs256_state("s3cret", Some("https://id.proofnest.test"));
        let token = hs256_token(
            "s3cret",
            serde_json::json!({
                "sub": "user_hs",
                "exp": 9_999_999_999i64,
                "iss": "https://id.proofnest.test",
                "role": "admin"
            }),
        );
        let mut parts = parts_with_token(Some(&token));

        let AdminOnly(user) = AdminOnly::from_request_parts(&mut parts, &ctx.state).await.unwrap();
        assert_eq!(user.user_id, "user_hs");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn hs256_wrong_secret_rejected() {
        let ctx = hs256_state("s3cret", None);
        let token = hs256_token(
            "other",
            serde_json::json!({ "sub": "user_hs", "exp": 9_999_999_999i64 }),
        );
        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn hs256_wrong_issuer_rejected() {
        let ctx = hs256_state("s3cret", Some("https://id.proofnest.test"));
        let token = hs256_token(
            "s3cret",
            serde_json::json!({ "sub": "u", "exp": 9_999_999_999i64, "iss": "https://evil.test" }),
        );
        let mut parts = parts_with_token(Some(&token));
        let result = Auth::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn prefers_extensions() {
        let ctx = TestContext::new();
        let mut parts = parts_with_token(None);
        parts.extensions.insert(AuthenticatedUser {
            user_id: "user_from_extension".to_string(),
            role: Role::Admin,
            session_id: None,
            issuer: "test".to_string(),
            expires_at: 0,
        });

        let Auth(user) = Auth::from_request_parts(&mut parts, &ctx.state).await.unwrap();
        assert_eq!(user.user_id, "user_from_extension");
    }

    #[tokio::test]
    async fn admin_only_rejects_client() {
        let ctx = TestContext::new();
        let token = unsigned_jwt(serde_json::json!({ "sub": "user_123", "exp": 9_999_999_999i64 }));
        let mut parts = parts_with_token(Some(&token));
        let result = AdminOnly::from_request_parts(&mut parts, &ctx.state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn optional_auth_is_none_without_token() {
        let ctx = TestContext::new();
        let mut parts = parts_with_token(None);
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
