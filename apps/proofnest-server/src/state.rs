// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwksManager;
use crate::blockchain::ProofLedger;
use crate::reconciler::Reconciler;
use crate::storage::{DocumentStore, ProofCache, ProofDatabase};

/// Users kept in the recent-proofs cache.
const RECENT_CACHE_CAPACITY: usize = 1024;
const RECENT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default receipt polling for payment verification.
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How bearer tokens are verified.
///
/// JWKS wins over the shared secret. With neither configured, tokens are
/// rejected unless the `dev` feature allows unverified decoding.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub jwks: Option<JwksManager>,
    /// HS256 shared secret
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<DocumentStore>,
    pub proofs: Arc<ProofDatabase>,
    pub cache: Arc<ProofCache>,
    pub ledger: Arc<dyn ProofLedger>,
    pub auth_config: AuthConfig,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(storage: DocumentStore, proofs: ProofDatabase, ledger: Arc<dyn ProofLedger>) -> Self {
        Self {
            storage: Arc::new(storage),
            proofs: Arc::new(proofs),
            cache: Arc::new(ProofCache::new(RECENT_CACHE_CAPACITY, RECENT_CACHE_TTL)),
            ledger,
            auth_config: AuthConfig::default(),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            public_base_url: None,
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn with_receipt_polling(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.receipt_timeout = timeout;
        self.receipt_poll_interval = poll_interval;
        self
    }

    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url;
        self
    }

    pub fn storage(&self) -> &DocumentStore {
        &self.storage
    }

    /// Reconciler sharing this state's stores and ledger.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.storage.clone(),
            self.proofs.clone(),
            self.cache.clone(),
            self.ledger.clone(),
        )
    }

    /// Link to the public share page of a proof.
    pub fn share_url(&self, proof_id: &str) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/proof/{proof_id}"))
    }
}
