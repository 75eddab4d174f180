// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::blockchain::{ContractError, LedgerError};
use crate::quota::QuotaExceeded;
use crate::storage::{ProofDbError, StorageError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYMENT_REQUIRED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            StorageError::AlreadyExists(what) => {
                ApiError::conflict(format!("{what} already exists"))
            }
            StorageError::Validation(msg) => ApiError::bad_request(msg),
            StorageError::PermissionDenied { .. } => ApiError::forbidden("Access denied"),
            other => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::internal("Storage error")
            }
        }
    }
}

impl From<ProofDbError> for ApiError {
    fn from(e: ProofDbError) -> Self {
        match e {
            ProofDbError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            ProofDbError::AlreadyExists(what) => {
                ApiError::conflict(format!("{what} already exists"))
            }
            other => {
                tracing::error!(error = %other, "Proof database failure");
                ApiError::internal("Database error")
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Reverted(ContractError::ProofAlreadyExists) => {
                ApiError::conflict("This content is already anchored on-chain")
            }
            LedgerError::Reverted(reason) => ApiError::bad_request(reason.to_string()),
            LedgerError::InvalidTxHash(_) => ApiError::bad_request(e.to_string()),
            LedgerError::ReadOnly => ApiError::service_unavailable(e.to_string()),
            LedgerError::Timeout(_) => ApiError::gateway_timeout(e.to_string()),
            other => {
                tracing::error!(error = %other, "Ledger failure");
                ApiError::bad_gateway("Blockchain node error")
            }
        }
    }
}

impl From<QuotaExceeded> for ApiError {
    fn from(e: QuotaExceeded) -> Self {
        ApiError::payment_required(e.to_string())
    }
}
