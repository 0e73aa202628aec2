//! Boots the IVR control plane: carrier client, session store with its
//! expiry sweep, the outcome reporter, and the HTTP surface the carrier and
//! the brain talk to.

use chrono::Utc;
use exodial::carrier::client::{CallPlacer, CarrierClient};
use exodial::reporter;
use exodial::server::{router, AppState};
use exodial::session::store::{SessionStore, SWEEP_INTERVAL};
use exodial::EngineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration incomplete");
            return;
        }
    };

    let store = Arc::new(SessionStore::new(config.live_ttl, config.reported_ttl));

    let reporter = match reporter::spawn(Arc::clone(&store), config.upstream_outcome_url.clone()) {
        Ok(handle) => handle,
        Err(error) => {
            tracing::error!(%error, "failed to start the outcome reporter");
            return;
        }
    };

    let placer: Arc<dyn CallPlacer> = match CarrierClient::from_config(&config) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::error!(%error, "failed to build the carrier client");
            return;
        }
    };

    {
        let store = Arc::clone(&store);
        let reporter = reporter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                for call_sid in store.sweep(Utc::now()).await {
                    reporter.enqueue(call_sid);
                }
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(&config, store, placer, reporter));

    tracing::info!(%addr, dialect = %config.dialect, "ivr control plane starting");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %addr, "failed to bind listener");
            return;
        }
    };

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(%error, "server exited with error");
    }
}
