// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Jiko Portal server
//!
//! Serves the staff portal pages and, unless disabled, the identity API the
//! portal signs in against.

use jiko_portal::{
    config::Config, identity::IdentityState, services::HttpIdentityClient, AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions and expired revocations are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        identity_url = %config.identity_url,
        embedded_identity = config.embedded_identity,
        "Starting Jiko Portal"
    );

    let identity = config
        .embedded_identity
        .then(|| Arc::new(IdentityState::from_config(&config)));

    let api = Arc::new(HttpIdentityClient::new(
        config.identity_url.clone(),
        config.identity_timeout,
    )?);

    if let Some(dir) = &config.token_store_dir {
        std::fs::create_dir_all(dir)?;
        tracing::info!(path = %dir.display(), "Persisting session credentials");
    }

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), api, identity)?);

    spawn_sweeper(state.clone());

    // Build router
    let app = jiko_portal::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            state.sessions.prune_idle(state.config.session_idle);
            if let Some(identity) = &state.identity {
                let purged = identity.tokens.purge_expired_revocations();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired token revocations");
                }
            }
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jiko_portal=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
