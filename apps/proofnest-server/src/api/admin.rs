// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Admin-only endpoints: audit log queries and on-demand reconciliation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    reconciler::ReconcileReport,
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository},
};

use super::record_audit;

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Query parameters for audit log queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Single day (YYYY-MM-DD); overrides the range
    pub date: Option<String>,
    /// Start date (YYYY-MM-DD), defaults to today
    pub start_date: Option<String>,
    /// End date (YYYY-MM-DD), defaults to today
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Maximum number of results (default 100, max 1000)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    /// Matches before paging
    pub total: usize,
    pub has_more: bool,
}

/// Query the audit log.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid date range"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn query_audit_log(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let (start_date, end_date) = match params.date.as_deref() {
        Some(day) => (day, day),
        None => (
            params.start_date.as_deref().unwrap_or(&today),
            params.end_date.as_deref().unwrap_or(&today),
        ),
    };

    let mut events = AuditRepository::new(state.storage()).read_events_range(start_date, end_date)?;

    if let Some(user_id) = &params.user_id {
        events.retain(|e| e.user_id.as_deref() == Some(user_id.as_str()));
    }
    if let Some(event_type) = &params.event_type {
        events.retain(|e| &e.event_type == event_type);
    }
    if let Some(resource_type) = &params.resource_type {
        events.retain(|e| e.resource_type.as_deref() == Some(resource_type.as_str()));
    }
    if let Some(resource_id) = &params.resource_id {
        events.retain(|e| e.resource_id.as_deref() == Some(resource_id.as_str()));
    }

    let total = events.len();
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).min(MAX_AUDIT_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let has_more = offset.saturating_add(limit) < total;
    let events = events.into_iter().skip(offset).take(limit).collect();

    audit_log!(state.storage(), AuditEventType::AdminAccess, &admin);

    Ok(Json(AuditLogResponse {
        events,
        total,
        has_more,
    }))
}

/// Run one reconciliation sweep now.
#[utoipa::path(
    post,
    path = "/v1/admin/reconcile",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep result", body = ReconcileReport),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn trigger_reconcile(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Json<ReconcileReport> {
    let report = state.reconciler().sweep().await;

    tracing::info!(
        admin = %admin.user_id,
        checked = report.checked,
        confirmed = report.confirmed,
        failed = report.failed,
        "Manual reconciliation finished"
    );
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::ReconcileTriggered)
            .with_user(&admin.user_id)
            .with_details(serde_json::json!({
                "checked": report.checked,
                "confirmed": report.confirmed,
                "failed": report.failed,
                "errors": report.errors,
            })),
    );

    Json(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::admin;
    use crate::state::test_support::TestContext;
    use axum::http::StatusCode;

    fn log(ctx: &TestContext, event: AuditEvent) {
        AuditRepository::new(ctx.state.storage()).log(&event).unwrap();
    }

    #[test]
    fn params_parse_event_type() {
        let params: AuditQueryParams =
            serde_json::from_str(r#"{"event_type":"proof_created","limit":5}"#).unwrap();
        assert_eq!(params.event_type, Some(AuditEventType::ProofCreated));
        assert_eq!(params.limit, Some(5));
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let ctx = TestContext::new();
        for i in 0..3 {
            log(
                &ctx,
                AuditEvent::new(AuditEventType::ProofCreated)
                    .with_user("alice")
                    .with_resource("proof", format!("p{i}")),
            );
        }
        log(&ctx, AuditEvent::new(AuditEventType::FolderCreated).with_user("bob"));

        let params = AuditQueryParams {
            user_id: Some("alice".to_string()),
            limit: Some(2),
            ..Default::default()
        };
        let Json(page) = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.events.len(), 2);
        assert!(page.has_more);

        let params = AuditQueryParams {
            event_type: Some(AuditEventType::FolderCreated),
            ..Default::default()
        };
        let Json(page) = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn single_day_without_events_is_empty() {
        let ctx = TestContext::new();
        let params = AuditQueryParams {
            date: Some("2020-01-01".to_string()),
            ..Default::default()
        };
        let Json(page) = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let params = AuditQueryParams {
            date: Some("yesterday".to_string()),
            ..Default::default()
        };
        let err = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let ctx = TestContext::new();
        let params = AuditQueryParams {
            start_date: Some("2026-02-10".to_string()),
            end_date: Some("2026-02-01".to_string()),
            ..Default::default()
        };
        let err = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_offset_and_long_range_are_handled() {
        let ctx = TestContext::new();
        log(&ctx, AuditEvent::new(AuditEventType::ProofCreated).with_user("alice"));

        let params = AuditQueryParams {
            offset: Some(usize::MAX),
            ..Default::default()
        };
        let Json(page) = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.events.is_empty());
        assert!(!page.has_more);

        let params = AuditQueryParams {
            start_date: Some("0001-01-01".to_string()),
            end_date: Some("9999-12-31".to_string()),
            ..Default::default()
        };
        let err = query_audit_log(AdminOnly(admin("root")), State(ctx.state.clone()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reconcile_is_audited() {
        let ctx = TestContext::new();
        let Json(report) = trigger_reconcile(AdminOnly(admin("root")), State(ctx.state.clone())).await;
        assert_eq!(report.checked, 0);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(ctx.state.storage()).read_events(&today).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == AuditEventType::ReconcileTriggered));
    }
}
