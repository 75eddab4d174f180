// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proofnest_server::{
    api::router,
    auth::JwksManager,
    blockchain::{signing::load_relay_signer, EvmLedger, LocalLedger, ProofLedger},
    config::{LogFormat, ServerConfig, DEFAULT_LOG_FILTER},
    state::{AppState, AuthConfig},
    storage::{DocumentStore, ProofDatabase, StoragePaths},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_ledger(config: &ServerConfig) -> Result<Arc<dyn ProofLedger>, BoxError> {
    if config.network.key == "local" {
        warn!("CHAIN=local: proofs are anchored on an in-process chain and lost on restart");
        return Ok(Arc::new(LocalLedger::new()));
    }

    let signer = load_relay_signer(
        config.signer_private_key.as_deref(),
        config.signer_key_path.as_deref(),
    )?;
    let contract_address = config
        .contract_address
        .as_deref()
        .ok_or("CONTRACT_ADDRESS is required")?;
    let ledger = EvmLedger::new(config.network.clone(), &config.rpc_url, contract_address, signer)?;
    match ledger.relay_address() {
        Some(relay) => info!(%relay, "Relay signer loaded"),
        None => warn!("No relay signer configured; only wallet-submitted anchors are accepted"),
    }
    Ok(Arc::new(ledger))
}

async fn build_auth_config(config: &ServerConfig) -> Result<AuthConfig, BoxError> {
    let jwks = match &config.jwks_url {
        Some(url) => {
            let manager = JwksManager::new(url.clone())?;
            if let Err(e) = manager.refresh().await {
                warn!(error = %e, jwks_url = %url, "Initial JWKS fetch failed; will retry on demand");
            }
            Some(manager)
        }
        None => None,
    };

    if !config.auth_verification_configured() {
        if cfg!(feature = "dev") {
            warn!("No token verification configured; accepting unverified tokens (dev build)");
        } else {
            warn!("No token verification configured; authenticated routes will return 503");
        }
    }

    Ok(AuthConfig {
        jwks,
        jwt_secret: config.jwt_secret.clone(),
        issuer: config.issuer.clone(),
        audience: config.audience.clone(),
    })
}

async fn shutdown_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }

    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.log_format);

    // Install the ring crypto provider before any TLS configuration is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let mut storage = DocumentStore::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    let proofs = ProofDatabase::open(&storage.paths().proofs_db())?;
    info!(data_dir = %config.data_dir.display(), "Storage initialized");

    let ledger = build_ledger(&config)?;
    info!(
        network = ledger.network().key,
        chain_id = ledger.network().chain_id,
        "Ledger ready"
    );

    let auth_config = build_auth_config(&config).await?;
    let state = AppState::new(storage, proofs, ledger).with_auth_config(auth_config);
    let poll_interval = state.receipt_poll_interval;
    let state = state
        .with_receipt_polling(config.receipt_timeout, poll_interval)
        .with_public_base_url(config.public_base_url.clone());

    let shutdown = CancellationToken::new();
    let reconciler = state
        .reconciler()
        .with_interval(config.reconcile_interval);
    let reconciler_task = tokio::spawn(reconciler.run(shutdown.clone()));

    let app = router(state);
    let addr: SocketAddr = config.bind_address().parse()?;

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone(), shutdown.clone()));

    match &config.tls {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key).await?;
            info!(%addr, "ProofNest server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "ProofNest server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = reconciler_task.await {
        warn!(error = %e, "Reconciler task ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}
