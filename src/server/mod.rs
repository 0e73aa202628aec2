pub mod callback;
pub mod initiate;
pub mod status;

use crate::carrier::client::CallPlacer;
use crate::carrier::validation::SignatureVerifier;
use crate::config::EngineConfig;
use crate::encoder::Dialect;
use crate::prompt::composer::Composer;
use crate::reporter::ReporterHandle;
use crate::session::machine::{Machine, DEFAULT_MAX_ATTEMPTS};
use crate::session::state::Language;
use crate::session::store::SessionStore;
use axum::extract::State;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub placer: Arc<dyn CallPlacer>,
    pub composer: Composer,
    pub machine: Machine,
    pub reporter: ReporterHandle,
    pub dialect: Dialect,
    /// Our own absolute callback URL; the XML dialect points gather actions
    /// back at it so the carrier re-fetches us.
    pub callback_url: String,
    pub default_language: Language,
    pub verifier: SignatureVerifier,
}

impl AppState {
    pub fn new(
        config: &EngineConfig,
        store: Arc<SessionStore>,
        placer: Arc<dyn CallPlacer>,
        reporter: ReporterHandle,
    ) -> Self {
        Self {
            store,
            placer,
            composer: Composer::new(config.default_prep_minutes),
            machine: Machine::new(DEFAULT_MAX_ATTEMPTS, config.default_prep_minutes),
            reporter,
            dialect: config.dialect,
            callback_url: config.callback_url(),
            default_language: config.default_language,
            verifier: SignatureVerifier::from_config(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route(
            "/callback",
            get(callback::handle_get).post(callback::handle_post),
        )
        .route("/status", post(status::handle))
        .route("/initiate/:kind", post(initiate::handle))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "live_sessions": state.store.live_count(),
        "dialect": state.dialect.to_string(),
    }))
}
