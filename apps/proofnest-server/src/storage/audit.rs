// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Audit logging for proof, folder, billing and admin operations.
//!
//! Events are appended to one JSONL file per UTC day.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{DocumentStore, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Proof events
    ProofCreated,
    ProofAnchorSubmitted,
    ProofMoved,
    ProofConfirmed,
    ProofFailed,

    // Folder events
    FolderCreated,
    FolderUpdated,
    FolderDeleted,

    // Billing events
    SubscriptionVerified,
    PaymentRejected,

    // Admin events
    AdminAccess,
    ReconcileTriggered,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who triggered the event (absent for background work).
    pub user_id: Option<String>,
    /// Resource affected (proof id, folder id, ...).
    pub resource_id: Option<String>,
    /// Resource type (proof, folder, subscription).
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a DocumentStore,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a DocumentStore) -> Self {
        Self { storage }
    }

    /// Append an event to its day's log.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.storage.append_raw(&path, &line)
    }

    /// Read audit events for a specific date. A day without events is empty.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        parse_date(date)?;
        let path = self.storage.paths().audit_events_file(date);
        let content = match self.storage.read_raw(&path) {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let content = String::from_utf8(content)
            .map_err(|e| StorageError::Validation(format!("Invalid UTF-8 in audit log: {e}")))?;

        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }

    /// Read events for an inclusive date range.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        if end < start {
            return Err(StorageError::Validation(
                "End date is before start date".to_string(),
            ));
        }
        if (end - start).num_days() >= MAX_RANGE_DAYS {
            return Err(StorageError::Validation(format!(
                "Date range exceeds {MAX_RANGE_DAYS} days"
            )));
        }

        let mut all_events = Vec::new();
        for day in start.iter_days().take_while(|d| *d <= end) {
            all_events.extend(self.read_events(&day.format("%Y-%m-%d").to_string())?);
        }
        Ok(all_events)
    }
}

/// Longest span `read_events_range` will scan, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

fn parse_date(date: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| StorageError::Validation(format!("Invalid date `{date}`: {e}")))
}

/// Log an audit event, ignoring storage failures.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type).with_user(&$user.user_id);
        if let Err(e) = repo.log(&event) {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }};
    ($storage:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user(&$user.user_id)
            .with_resource($resource_type, $resource_id);
        if let Err(e) = repo.log(&event) {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }};
}
