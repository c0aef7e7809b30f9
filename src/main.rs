// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use dcloud_storage::{
    api::router,
    config::Config,
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env());

    let config = Config::from_env().map_err(|e| {
        tracing::error!("configuration error: {e}");
        e
    })?;
    tracing::info!(network = config.network.name, ledger = ?config.ledger, gateway = ?config.gateway, "configuration loaded");

    let state = AppState::from_config(&config).map_err(|e| {
        tracing::error!("startup failed: {e}");
        e
    })?;

    // A local signer can only act for its own key, so connect it up front.
    if let Some(owner) = state.signer {
        match state.session.connect(owner).await {
            Ok(session_state) => {
                tracing::info!(owner = %owner, state = ?session_state, "signer connected")
            }
            Err(e) => tracing::warn!(owner = %owner, "initial connect failed: {e}"),
        }
    }

    let session = state.session.clone();
    let app = router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("dcloud bridge listening on http://{addr} (docs at /docs)");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    session.disconnect().await;
    tracing::info!("bridge stopped");
    Ok(())
}
