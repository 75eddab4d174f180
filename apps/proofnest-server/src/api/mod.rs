// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

use axum::{
    body::Body,
    http::Request,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    state::AppState,
    storage::{AuditEvent, AuditRepository},
};

pub mod admin;
pub mod billing;
pub mod folders;
pub mod hashing;
pub mod health;
pub mod proofs;
pub mod public;
pub mod stats;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/hash", post(hashing::hash_content))
        .route("/verify", post(hashing::verify_content))
        .route(
            "/proofs",
            get(proofs::list_proofs).post(proofs::create_proof),
        )
        .route("/proofs/recent", get(proofs::recent_proofs))
        .route("/proofs/{id}", get(proofs::get_proof))
        .route("/proofs/{id}/folder", put(proofs::move_proof))
        .route("/proofs/{id}/anchor", post(proofs::attach_anchor))
        .route("/public/proofs/{id}", get(public::get_public_proof))
        .route(
            "/folders",
            get(folders::list_folders).post(folders::create_folder),
        )
        .route(
            "/folders/{id}",
            put(folders::update_folder).delete(folders::delete_folder),
        )
        .route("/usage", get(stats::get_usage))
        .route("/stats", get(stats::get_stats))
        .route("/billing/plans", get(billing::list_plans))
        .route("/billing/subscription", get(billing::get_subscription))
        .route("/billing/verify", post(billing::verify_payment))
        .route("/admin/audit", get(admin::query_audit_log))
        .route("/admin/reconcile", post(admin::trigger_reconcile))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Append an audit event; failures are logged and otherwise ignored.
pub(crate) fn record_audit(state: &AppState, event: AuditEvent) {
    if let Err(e) = AuditRepository::new(state.storage()).log(&event) {
        tracing::warn!(error = %e, event_type = ?event.event_type, "Failed to write audit event");
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        hashing::hash_content,
        hashing::verify_content,
        proofs::create_proof,
        proofs::list_proofs,
        proofs::recent_proofs,
        proofs::get_proof,
        proofs::move_proof,
        proofs::attach_anchor,
        public::get_public_proof,
        folders::list_folders,
        folders::create_folder,
        folders::update_folder,
        folders::delete_folder,
        stats::get_usage,
        stats::get_stats,
        billing::list_plans,
        billing::get_subscription,
        billing::verify_payment,
        admin::query_audit_log,
        admin::trigger_reconcile
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            hashing::HashRequest,
            hashing::HashResponse,
            hashing::VerifyRequest,
            hashing::VerifyResponse,
            hashing::OnChainRecord,
            proofs::CreateProofRequest,
            proofs::ProofView,
            proofs::ProofListResponse,
            proofs::MoveProofRequest,
            proofs::AttachAnchorRequest,
            public::PublicProofResponse,
            folders::CreateFolderRequest,
            folders::UpdateFolderRequest,
            folders::FolderListResponse,
            folders::DeleteFolderResponse,
            stats::StatsResponse,
            billing::PlanInfo,
            billing::PlansResponse,
            billing::SubscriptionResponse,
            billing::VerifyPaymentRequest,
            admin::AuditLogResponse,
            crate::quota::Plan,
            crate::quota::QuotaStatus,
            crate::reconciler::ReconcileReport,
            crate::storage::StoredFolder,
            crate::storage::StoredSubscription,
            crate::storage::SubscriptionStatus,
            crate::storage::ProofStatus,
            crate::storage::AuditEvent,
            crate::storage::AuditEventType
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Hashing", description = "Content fingerprinting and verification"),
        (name = "Proofs", description = "Proof creation, listing and anchoring"),
        (name = "Public", description = "Shareable proof pages"),
        (name = "Folders", description = "Folder organization"),
        (name = "Stats", description = "Usage and dashboard statistics"),
        (name = "Billing", description = "Plans and on-chain subscription payments"),
        (name = "Admin", description = "Audit log and operational tooling")
    )
)]
pub struct ApiDoc;


#[cfg(test)]
mod tests {
    use super::test_support::{send, token};
    use super::*;
    use crate::state::test_support::TestContext;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn openapi_document_is_served() {
        let ctx = TestContext::new();
        let app = router(ctx.state.clone());
        let (status, doc) = send(&app, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/v1/proofs"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let ctx = TestContext::new();
        let app = router(ctx.state.clone());
        let response = tower::ServiceExt::oneshot(
            app,
            Request::builder()
                .uri("/health/live")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn proof_lifecycle_through_router() {
        let ctx = TestContext::new();
        let app = router(ctx.state.clone());
        let alice = token("alice", "client");

        let (status, _) = send(&app, "GET", "/v1/proofs", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, folder) = send(
            &app,
            "POST",
            "/v1/folders",
            Some(&alice),
            Some(serde_json::json!({ "name": "Contracts" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let folder_id = folder["id"].as_str().unwrap().to_string();

        let (status, proof) = send(
            &app,
            "POST",
            "/v1/proofs",
            Some(&alice),
            Some(serde_json::json!({
                "content": "  My manuscript, chapter one\r\n",
                "folder_id": folder_id,
                "anchor": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(proof["status"], "pending");
        assert_eq!(
            proof["content_hash"],
            crate::hashing::fingerprint("My manuscript, chapter one")
        );
        let proof_id = proof["id"].as_str().unwrap().to_string();

        let report = ctx.state.reconciler().sweep().await;
        assert_eq!(report.confirmed, 1);

        let (status, public) =
            send(&app, "GET", &format!("/v1/public/proofs/{proof_id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(public["status"], "confirmed");
        assert!(public.get("content").is_none());
        assert_eq!(public["viewer_is_owner"], false);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/v1/folders/{folder_id}"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, listed) =
            send(&app, "GET", "/v1/proofs?root=true", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);
        assert!(listed["items"][0]["folder_id"].is_null());

        let bob = token("bob", "client");
        let (status, _) =
            send(&app, "GET", &format!("/v1/proofs/{proof_id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let ctx = TestContext::new();
        let app = router(ctx.state.clone());

        let (status, body) = send(
            &app,
            "POST",
            "/v1/admin/reconcile",
            Some(&token("alice", "client")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "insufficient_permissions");

        let (status, body) = send(
            &app,
            "POST",
            "/v1/admin/reconcile",
            Some(&token("root", "admin")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checked"], 0);
    }
}
