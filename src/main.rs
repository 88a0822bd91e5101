// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use midday_fee_relay::{
    api::router,
    balancer::{FeePolicy, TransactionBalancer},
    config::RelayConfig,
    coordinator::SubmissionCoordinator,
    keys::KeyManager,
    ledger::ResourceLedger,
    logging::init_logging,
    network::{HttpNodeClient, HttpProofProvider, NodeClient},
    reclaimer::TicketReclaimer,
    resync::PoolResync,
    state::AppState,
};

#[tokio::main]
async fn main() {
    init_logging();

    let (config, seed) = match RelayConfig::from_env() {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    // A bad seed is fatal: the relay must not serve without signing custody.
    let keys = match KeyManager::from_seed(&seed) {
        Ok(keys) => Arc::new(keys),
        Err(e) => {
            error!(error = %e, "key derivation failed");
            std::process::exit(1);
        }
    };
    drop(seed);

    info!(
        network = %config.network,
        node = %config.node_url,
        indexer = %config.indexer_url,
        proof_server = %config.proof_server_url,
        relay_address = %keys.address(),
        "starting fee relay"
    );

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .expect("failed to build HTTP client");
    let node: Arc<dyn NodeClient> = Arc::new(HttpNodeClient::new(
        http.clone(),
        config.node_url.clone(),
        config.indexer_url.clone(),
    ));
    let proofs = Arc::new(HttpProofProvider::new(
        http,
        config.proof_server_url.clone(),
    ));

    let ledger = Arc::new(ResourceLedger::new(
        config.ticket_ttl.as_millis() as u64,
        config.reserve_buffer,
    ));

    // Seed the pool before serving; a failure here is not fatal: the
    // resync task keeps retrying and /health reports "syncing" meanwhile.
    match node.owned_units(keys.address()).await {
        Ok(units) => {
            let summary = ledger.sync(units).await;
            info!(added = summary.added, "initial pool sync complete");
        }
        Err(e) => {
            warn!(error = %e, "initial pool sync failed; starting unsynced");
        }
    }

    let balancer = Arc::new(TransactionBalancer::new(
        Arc::clone(&keys),
        Arc::clone(&ledger),
        proofs,
        FeePolicy::default(),
    ));
    let coordinator = Arc::new(SubmissionCoordinator::new(
        Arc::clone(&ledger),
        Arc::clone(&node),
        keys.address().to_string(),
        config.retry,
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn(
        TicketReclaimer::new(Arc::clone(&ledger), config.ticket_ttl).run(shutdown.clone()),
    );
    tokio::spawn(
        PoolResync::new(
            Arc::clone(&ledger),
            Arc::clone(&node),
            keys.address().to_string(),
            config.resync_interval,
        )
        .run(shutdown.clone()),
    );

    let state = AppState::new(balancer, coordinator, ledger, keys.address().to_string());
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    info!(%addr, "fee relay listening (docs at /docs)");
    info!("  POST /balance-tx - balance and sign transactions");
    info!("  POST /submit-tx  - submit finalized transactions");
    info!("  GET  /health     - health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server failed");
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
    shutdown.cancel();
}
